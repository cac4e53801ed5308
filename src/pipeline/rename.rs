//! Language-suffix renaming: `notes.txt` + `fra` → `notes-fra.txt`.
//!
//! The rename never overwrites. A candidate name is claimed with
//! [`std::fs::hard_link`], which fails with `AlreadyExists` instead of
//! replacing the destination, so a file that appears between our check and
//! our move is never clobbered. Once the link exists the old name is
//! removed; readers see either the old name or the new one, both holding the
//! same fully written UTF-8 content.
//!
//! Filesystems without hard links (FAT, some network mounts) fall back to an
//! existence check followed by a plain rename.

use crate::error::ConvertError;
use crate::suffixes::SuffixTable;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rename `path` so its stem ends with `-<suffix>`, returning the new path.
///
/// * `suffix` absent → `path` is returned untouched.
/// * Stem already ends with `-<suffix>` → `path` is returned untouched.
/// * Otherwise the first free name among `stem-suffix.ext`,
///   `stem-suffix_1.ext`, … `stem-suffix_<max_attempts>.ext` is used.
///
/// # Errors
/// [`ConvertError::RenameExhausted`] when every candidate is taken, and
/// [`ConvertError::RenameFailed`] for any I/O failure. In both cases the
/// file is still at `path`.
pub fn append_language_suffix(
    path: &Path,
    suffix: Option<&str>,
    max_attempts: usize,
) -> Result<PathBuf, ConvertError> {
    let Some(suffix) = suffix.filter(|s| !s.is_empty()) else {
        return Ok(path.to_path_buf());
    };

    if is_tagged(path, suffix) {
        debug!("'{}' already tagged with '-{}'", path.display(), suffix);
        return Ok(path.to_path_buf());
    }

    for n in 0..=max_attempts {
        let target = candidate(path, suffix, n);
        match claim(path, &target) {
            Ok(()) => {
                info!("Renamed '{}' -> '{}'", path.display(), target.display());
                return Ok(target);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Candidate '{}' taken", target.display());
            }
            Err(source) => {
                return Err(ConvertError::RenameFailed {
                    path: path.to_path_buf(),
                    target,
                    source,
                });
            }
        }
    }

    warn!(
        "No free '-{}' name for '{}' after {} attempts",
        suffix,
        path.display(),
        max_attempts
    );
    Err(ConvertError::RenameExhausted {
        path: path.to_path_buf(),
        suffix: suffix.to_string(),
        attempts: max_attempts,
    })
}

/// Whether the file stem already ends with `-<suffix>`.
///
/// Compared on the raw name bytes, so stems that are not valid UTF-8 are
/// still recognised.
pub fn is_tagged(path: &Path, suffix: &str) -> bool {
    let Some(stem) = path.file_stem() else {
        return false;
    };
    let stem = stem.as_encoded_bytes();
    stem.len() > suffix.len()
        && stem.ends_with(suffix.as_bytes())
        && stem[stem.len() - suffix.len() - 1] == b'-'
}

/// The `n`-th candidate name: `n == 0` is the plain `stem-suffix.ext`.
///
/// Stem and extension are carried over byte for byte.
pub fn candidate(path: &Path, suffix: &str, n: usize) -> PathBuf {
    let mut name = path.file_stem().map(OsStr::to_os_string).unwrap_or_default();
    name.push("-");
    name.push(suffix);
    if n > 0 {
        name.push(format!("_{n}"));
    }
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// Whether renaming `base` could ever land on `other`: same folder and
/// extension, and `other`'s stem is `base`'s stem plus `-<suffix>` or
/// `-<suffix>_<n>` for a suffix `suffixes` can produce.
pub fn could_claim(base: &Path, other: &Path, suffixes: &SuffixTable) -> bool {
    if base.parent() != other.parent() || base.extension() != other.extension() {
        return false;
    }
    let (Some(stem), Some(other_stem)) = (base.file_stem(), other.file_stem()) else {
        return false;
    };
    let Some(rest) = other_stem
        .as_encoded_bytes()
        .strip_prefix(stem.as_encoded_bytes())
        .and_then(|r| r.strip_prefix(b"-"))
    else {
        return false;
    };
    let Ok(rest) = std::str::from_utf8(rest) else {
        return false;
    };
    let tag = match rest.rsplit_once('_') {
        Some((tag, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => tag,
        _ => rest,
    };
    suffixes.could_produce(tag) || suffixes.could_produce(rest)
}

/// Move `from` to `to` without ever replacing an existing `to`.
fn claim(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(from) {
                // Leave only the original name behind.
                if let Err(undo) = fs::remove_file(to) {
                    warn!(
                        "Could not remove link '{}' after failed rename of '{}': {}",
                        to.display(),
                        from.display(),
                        undo
                    );
                }
                return Err(e);
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(e) => {
            debug!(
                "Hard link unavailable ({}), falling back to rename for '{}'",
                e,
                from.display()
            );
            if fs::symlink_metadata(to).is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("'{}' exists", to.display()),
                ));
            }
            fs::rename(from, to)
        }
    }
}
