//! Filesystem side of the pipeline: target placement, source read, backup,
//! and the atomic UTF-8 write.
//!
//! Writes go to a [`tempfile::NamedTempFile`] in the target's own directory
//! and are then persisted over the target with a rename, so a crash or a full
//! disk never leaves a half-written file under the target name.

use crate::error::ConvertError;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tracing::debug;

/// Where the converted content for `source` is written.
///
/// With an output folder the folder is created (with parents) and the target
/// is `folder/<source file name>`; otherwise the source is rewritten in place.
pub fn resolve_target(source: &Path, output_folder: Option<&Path>) -> Result<PathBuf, ConvertError> {
    let Some(folder) = output_folder else {
        return Ok(source.to_path_buf());
    };

    let name = source.file_name().ok_or_else(|| ConvertError::NotAFile {
        path: source.to_path_buf(),
    })?;

    fs::create_dir_all(folder).map_err(|e| ConvertError::OutputDirFailed {
        path: folder.to_path_buf(),
        source: e,
    })?;

    Ok(folder.join(name))
}

/// Read the whole source file.
pub fn read_source(path: &Path) -> Result<Vec<u8>, ConvertError> {
    let meta = fs::metadata(path).map_err(|e| ConvertError::from_read(path.to_path_buf(), e))?;
    if !meta.is_file() {
        return Err(ConvertError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let bytes = fs::read(path).map_err(|e| ConvertError::from_read(path.to_path_buf(), e))?;
    debug!("Read {} bytes from '{}'", bytes.len(), path.display());
    Ok(bytes)
}

/// `<target>.bak`, next to the target.
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    target.with_file_name(name)
}

/// Copy the existing `target` to `<target>.bak`, keeping its permissions and
/// modification time. Returns `None` when there is nothing to back up.
///
/// An existing `.bak` is replaced.
pub fn backup(target: &Path) -> Result<Option<PathBuf>, ConvertError> {
    let meta = match fs::metadata(target) {
        Ok(m) if m.is_file() => m,
        _ => return Ok(None),
    };

    let bak = backup_path(target);
    let fail = |e| ConvertError::BackupFailed {
        path: target.to_path_buf(),
        backup: bak.clone(),
        source: e,
    };

    // fs::copy carries permission bits over.
    fs::copy(target, &bak).map_err(fail)?;
    if let Ok(modified) = meta.modified() {
        File::options()
            .write(true)
            .open(&bak)
            .and_then(|f| f.set_modified(modified))
            .map_err(fail)?;
    }

    debug!("Backed up '{}' to '{}'", target.display(), bak.display());
    Ok(Some(bak))
}

/// Atomically replace `target` with `bytes`.
///
/// A pre-existing target keeps its permission bits. A new one gets the same
/// mode a plain `File::create` would (0666 less the umask on unix).
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let fail = |e| ConvertError::WriteFailed {
        path: target.to_path_buf(),
        source: e,
    };

    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let previous = fs::metadata(target).ok();

    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(dir).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.flush().map_err(fail)?;
    if let Some(meta) = previous {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(fail)?;
    }
    tmp.persist(target).map_err(|e| fail(e.error))?;

    debug!("Wrote {} bytes to '{}'", bytes.len(), target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn in_place_target_is_source() {
        let p = Path::new("some/dir/file.txt");
        assert_eq!(resolve_target(p, None).unwrap(), p);
    }

    #[test]
    fn output_folder_is_created() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a").join("b");
        let target = resolve_target(Path::new("/src/subs.srt"), Some(&out)).unwrap();
        assert!(out.is_dir());
        assert_eq!(target, out.join("subs.srt"));
    }

    #[test]
    fn output_folder_under_a_file_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let err = resolve_target(Path::new("a.txt"), Some(&blocker.join("out"))).unwrap_err();
        assert_eq!(err.kind(), "output_dir_failed");
    }

    #[test]
    fn read_classifies_failures() {
        let dir = TempDir::new().unwrap();
        let missing = read_source(&dir.path().join("nope.txt")).unwrap_err();
        assert_eq!(missing.kind(), "source_not_found");
        let not_file = read_source(dir.path()).unwrap_err();
        assert_eq!(not_file.kind(), "not_a_file");
    }

    #[test]
    fn backup_path_appends_bak() {
        assert_eq!(
            backup_path(Path::new("x/sample.srt")),
            Path::new("x/sample.srt.bak")
        );
    }

    #[test]
    fn backup_keeps_bytes_and_mtime() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("sample.srt");
        fs::write(&target, [0xE9, 0x74, 0xE9]).unwrap();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        File::options()
            .write(true)
            .open(&target)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let bak = backup(&target).unwrap().unwrap();
        assert_eq!(bak, dir.path().join("sample.srt.bak"));
        assert_eq!(fs::read(&bak).unwrap(), vec![0xE9, 0x74, 0xE9]);
        assert_eq!(fs::metadata(&bak).unwrap().modified().unwrap(), old);
    }

    #[test]
    fn backup_of_missing_target_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(backup(&dir.path().join("new.txt")).unwrap().is_none());
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.txt");
        fs::write(&target, "old").unwrap();
        write_atomic(&target, "new content".as_bytes()).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new content");
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("script.txt");
        fs::write(&target, "old").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o640)).unwrap();
        write_atomic(&target, b"new").unwrap();
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_new_file_follows_umask() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let reference = dir.path().join("reference.txt");
        fs::write(&reference, "x").unwrap();
        let target = dir.path().join("fresh.txt");
        write_atomic(&target, b"new").unwrap();
        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&target), mode(&reference));
    }
}
