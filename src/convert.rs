//! Conversion entry points: one file, or a whole batch.
//!
//! [`convert_file`] is the synchronous per-file pipeline. [`convert_batch`]
//! fans a list of paths out over a bounded pool of blocking workers and
//! waits for all of them; [`crate::stream::convert_stream`] drives the same
//! workers but hands outcomes back as they complete.
//!
//! ## Isolation
//!
//! Every file is read, decoded, written and renamed on its own. A failure
//! becomes that file's [`FileOutcome`] and never stops the rest of the
//! batch. The only cross-file check is done up front: two distinct sources
//! that would be written to the same target fail the later ones with
//! [`ConvertError::DuplicateTarget`] instead of racing. With an output
//! folder and language tagging, "the same target" includes any name the
//! language rename could move an earlier file to (`movie.srt` and
//! `movie-eng.srt`).

use crate::config::{ConversionConfig, ConversionRequest};
use crate::error::ConvertError;
use crate::output::{BatchOutput, BatchStats, ConversionResult, FileOutcome};
use crate::pipeline::encoding::{self, EncodingDecision};
use crate::pipeline::language::{LanguageDecision, LanguageTagger};
use crate::pipeline::{io, rename, repair};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert one file to UTF-8.
///
/// `tagger` is `None` when language tagging is disabled. Blocking: call it
/// from a worker thread when running inside an async runtime.
///
/// # Errors
/// Only an unreadable source, an unwritable destination (including the
/// backup), or a failed rename abort the file. Encoding and language
/// problems degrade and are reported through the result's fields.
///
/// When the rename fails the UTF-8 content has already been written and
/// stays under the pre-rename name.
pub fn convert_file(
    request: &ConversionRequest,
    tagger: Option<&LanguageTagger>,
    max_rename_attempts: usize,
) -> Result<ConversionResult, ConvertError> {
    let start = Instant::now();
    let source = &request.source_path;
    info!("Converting '{}'", source.display());

    // ── Step 1: Target ───────────────────────────────────────────────────
    let target = io::resolve_target(source, request.output_folder.as_deref())?;

    // ── Step 2: Read ─────────────────────────────────────────────────────
    let raw = io::read_source(source)?;

    // ── Step 3: Resolve encoding and decode ──────────────────────────────
    let EncodingDecision {
        name,
        confidence,
        decoded_text,
        replacements,
    } = encoding::resolve(&raw, request.forced_encoding.as_deref());
    drop(raw);

    // ── Step 4: Repair ───────────────────────────────────────────────────
    let text = repair::normalize(decoded_text, request.auto_fix);

    // ── Step 5/6: Backup (in place only) ─────────────────────────────────
    let backup_path = if request.make_backup && request.output_folder.is_none() {
        io::backup(&target)?
    } else {
        None
    };

    // ── Step 7: Write UTF-8 ──────────────────────────────────────────────
    io::write_atomic(&target, text.as_bytes())?;

    // ── Step 8: Tag and rename ───────────────────────────────────────────
    let language = tagger.map(|t| t.detect(&text)).unwrap_or_default();
    let LanguageDecision {
        tag, probability, ..
    } = language;
    let final_path =
        rename::append_language_suffix(&target, tag.as_deref(), max_rename_attempts)?;

    info!(
        "Converted '{}' ({} @ {:.2}) -> '{}' in {}ms",
        source.display(),
        name,
        confidence,
        final_path.display(),
        start.elapsed().as_millis()
    );

    // ── Step 9: Result ───────────────────────────────────────────────────
    Ok(ConversionResult {
        source_path: source.clone(),
        encoding_used: name,
        confidence,
        final_path,
        backup_path,
        language_tag: tag,
        language_confidence: probability,
        replacements,
    })
}

/// Convert every file in `paths`, at most `config.concurrency` at a time.
///
/// Never fails as a whole: each distinct input yields exactly one
/// [`FileOutcome`], returned in submission order. Repeated paths are
/// converted once and produce no further outcome.
///
/// # Example
/// ```rust,no_run
/// use utf8conv::{convert_batch, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = ConversionConfig::builder().make_backup(false).build().unwrap();
/// let output = convert_batch(["a.srt", "b.txt"], &config).await;
/// for (path, err) in output.failures() {
///     eprintln!("{}: {err}", path.display());
/// }
/// # }
/// ```
pub async fn convert_batch<I, P>(paths: I, config: &ConversionConfig) -> BatchOutput
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let start = Instant::now();
    let plan = BatchPlan::new(paths, config);
    let total = plan.total();
    info!("Starting batch of {} files", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let ctx = Arc::new(BatchContext::new(config, total));
    let mut outcomes = plan.rejected;
    for o in &outcomes {
        ctx.report(o);
    }

    let converted: Vec<FileOutcome> = stream::iter(plan.jobs.into_iter().map(|(index, path)| {
        let ctx = Arc::clone(&ctx);
        async move { ctx.run(index, path).await }
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;
    outcomes.extend(converted);
    outcomes.sort_by_key(|o| o.index);

    let stats = BatchStats::from_outcomes(&outcomes, start.elapsed().as_millis() as u64);
    info!(
        "Batch complete: {}/{} converted, {} failed, {}ms",
        stats.converted_files, stats.total_files, stats.failed_files, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.converted_files);
    }

    BatchOutput { outcomes, stats }
}

/// Synchronous wrapper around [`convert_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_batch_sync<I, P>(paths: I, config: &ConversionConfig) -> Result<BatchOutput, ConvertError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    Ok(tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_batch(paths, config)))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Deduplicated inputs, split into files to convert and files rejected
/// before any I/O.
pub(crate) struct BatchPlan {
    pub(crate) jobs: Vec<(usize, PathBuf)>,
    pub(crate) rejected: Vec<FileOutcome>,
}

impl BatchPlan {
    pub(crate) fn new<I, P>(paths: I, config: &ConversionConfig) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut seen = HashSet::new();
        let mut targets: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut claimed: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut jobs = Vec::new();
        let mut rejected = Vec::new();
        // Redirected targets do not exist yet, so a language rename could
        // land on another job's target.
        let renames = config.tag_language && config.output_folder.is_some();

        for (index, path) in paths.into_iter().enumerate() {
            let path = path.as_ref().to_path_buf();
            if !seen.insert(identity(&path)) {
                debug!("Skipping repeated input '{}'", path.display());
                continue;
            }

            let target = planned_target(&path, config.output_folder.as_deref());
            let clash = targets.get(&target).cloned().or_else(|| {
                renames
                    .then(|| {
                        claimed.iter().find(|(earlier, _)| {
                            rename::could_claim(earlier, &target, &config.suffixes)
                                || rename::could_claim(&target, earlier, &config.suffixes)
                        })
                    })
                    .flatten()
                    .map(|(_, first)| first.clone())
            });

            match clash {
                Some(first) => {
                    warn!(
                        "'{}' maps to '{}', which clashes with '{}'",
                        path.display(),
                        target.display(),
                        first.display()
                    );
                    rejected.push(FileOutcome {
                        index,
                        source_path: path.clone(),
                        result: Err(ConvertError::DuplicateTarget {
                            path,
                            target,
                            first,
                        }),
                    });
                }
                None => {
                    targets.insert(target.clone(), path.clone());
                    claimed.push((target, path.clone()));
                    jobs.push((index, path));
                }
            }
        }

        Self { jobs, rejected }
    }

    pub(crate) fn total(&self) -> usize {
        self.jobs.len() + self.rejected.len()
    }
}

/// Same file for dedup purposes: canonical when it resolves, as given otherwise.
fn identity(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// The target `convert_file` will write, without touching the filesystem.
fn planned_target(source: &Path, output_folder: Option<&Path>) -> PathBuf {
    match (output_folder, source.file_name()) {
        (Some(folder), Some(name)) => identity(folder).join(name),
        _ => identity(source),
    }
}

/// Shared, read-only state for the workers of one batch.
pub(crate) struct BatchContext {
    config: ConversionConfig,
    tagger: Option<Arc<LanguageTagger>>,
    total: usize,
}

impl BatchContext {
    pub(crate) fn new(config: &ConversionConfig, total: usize) -> Self {
        let tagger = config
            .tag_language
            .then(|| Arc::new(LanguageTagger::from_config(config)));
        Self {
            config: config.clone(),
            tagger,
            total,
        }
    }

    /// Convert one file on the blocking pool and report it.
    pub(crate) async fn run(&self, index: usize, path: PathBuf) -> FileOutcome {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_file_start(index, self.total, &path);
        }

        let request = self.config.request_for(path.clone());
        let tagger = self.tagger.clone();
        let attempts = self.config.max_rename_attempts;
        let result = tokio::task::spawn_blocking(move || {
            convert_file(&request, tagger.as_deref(), attempts)
        })
        .await
        .unwrap_or_else(|e| Err(ConvertError::Internal(format!("Conversion task panicked: {}", e))));

        let outcome = FileOutcome {
            index,
            source_path: path,
            result,
        };
        self.report(&outcome);
        outcome
    }

    /// Fire the completion or error callback for `outcome`.
    pub(crate) fn report(&self, outcome: &FileOutcome) {
        match &outcome.result {
            Ok(result) => {
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_file_complete(outcome.index, self.total, result);
                }
            }
            Err(e) => {
                warn!("Failed '{}': {}", outcome.source_path.display(), e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_file_error(outcome.index, self.total, &outcome.source_path, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_tag_config() -> ConversionConfig {
        ConversionConfig::builder().tag_language(false).build().unwrap()
    }

    #[test]
    fn in_place_makes_backup() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("sample.srt");
        fs::write(&src, b"caf\xe9 cr\xe8me br\xfbl\xe9e").unwrap();

        let req = ConversionRequest {
            forced_encoding: Some("Windows-1252".into()),
            ..ConversionRequest::new(&src)
        };
        let r = convert_file(&req, None, 10).unwrap();
        assert_eq!(r.encoding_used, "windows-1252");
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.final_path, src);
        assert_eq!(r.backup_path, Some(dir.path().join("sample.srt.bak")));
        assert_eq!(fs::read_to_string(&src).unwrap(), "café crème brûlée");
        assert_eq!(
            fs::read(dir.path().join("sample.srt.bak")).unwrap(),
            b"caf\xe9 cr\xe8me br\xfbl\xe9e"
        );
    }

    #[test]
    fn redirected_never_backs_up() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "plain").unwrap();
        let out = dir.path().join("out");

        let req = ConversionRequest {
            output_folder: Some(out.clone()),
            make_backup: true,
            ..ConversionRequest::new(&src)
        };
        let r = convert_file(&req, None, 10).unwrap();
        assert_eq!(r.final_path, out.join("a.txt"));
        assert!(r.backup_path.is_none());
        assert!(!out.join("a.txt.bak").exists());
        assert!(!dir.path().join("a.txt.bak").exists());
    }

    #[test]
    fn missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let err = convert_file(&ConversionRequest::new(dir.path().join("x.txt")), None, 10)
            .unwrap_err();
        assert_eq!(err.kind(), "source_not_found");
    }

    #[test]
    fn plan_drops_repeats_and_flags_shared_targets() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("one").join("same.txt");
        let b = dir.path().join("two").join("same.txt");
        fs::create_dir_all(a.parent().unwrap()).unwrap();
        fs::create_dir_all(b.parent().unwrap()).unwrap();
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let config = ConversionConfig::builder()
            .output_folder(dir.path().join("out"))
            .build()
            .unwrap();
        let plan = BatchPlan::new([&a, &a, &b], &config);
        assert_eq!(plan.jobs, vec![(0, a.clone())]);
        assert_eq!(plan.rejected.len(), 1);
        assert_eq!(plan.rejected[0].index, 2);
        assert_eq!(
            plan.rejected[0].result.as_ref().unwrap_err().kind(),
            "duplicate_target"
        );
        assert_eq!(plan.total(), 2);
    }

    #[test]
    fn plan_flags_targets_a_rename_could_reach() {
        let dir = TempDir::new().unwrap();
        let config = ConversionConfig::builder()
            .output_folder(dir.path().join("out"))
            .build()
            .unwrap();
        let plan = BatchPlan::new(
            ["a/movie.srt", "b/movie-eng.srt", "c/movie-eng_2.srt", "d/movie-final.srt"],
            &config,
        );
        let jobs: Vec<usize> = plan.jobs.iter().map(|(i, _)| *i).collect();
        assert_eq!(jobs, vec![0, 3]);
        let rejected: Vec<usize> = plan.rejected.iter().map(|o| o.index).collect();
        assert_eq!(rejected, vec![1, 2]);
        assert!(plan.rejected.iter().all(|o| matches!(
            o.result,
            Err(ConvertError::DuplicateTarget { ref first, .. }) if first == Path::new("a/movie.srt")
        )));

        // Order does not matter: the tagged name first still blocks the base.
        let plan = BatchPlan::new(["b/movie-eng.srt", "a/movie.srt"], &config);
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.rejected[0].index, 1);
    }

    #[test]
    fn plan_without_tagging_allows_tagged_lookalikes() {
        let dir = TempDir::new().unwrap();
        let config = ConversionConfig::builder()
            .output_folder(dir.path().join("out"))
            .tag_language(false)
            .build()
            .unwrap();
        let plan = BatchPlan::new(["a/movie.srt", "b/movie-eng.srt"], &config);
        assert_eq!(plan.jobs.len(), 2);
        assert!(plan.rejected.is_empty());
    }

    #[test]
    fn plan_in_place_has_no_shared_targets() {
        let config = no_tag_config();
        let plan = BatchPlan::new(["x/a.txt", "y/a.txt"], &config);
        assert_eq!(plan.jobs.len(), 2);
        assert!(plan.rejected.is_empty());
    }

    #[test]
    fn sync_batch_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.txt");
        fs::write(&good, "hello").unwrap();
        let bad = dir.path().join("missing.txt");

        let out = convert_batch_sync([&bad, &good], &no_tag_config()).unwrap();
        assert_eq!(out.outcomes.len(), 2);
        assert_eq!(out.outcomes[0].index, 0);
        assert!(!out.outcomes[0].is_success());
        assert!(out.outcomes[1].is_success());
        assert_eq!(out.stats.converted_files, 1);
        assert_eq!(out.stats.failed_files, 1);
    }
}
