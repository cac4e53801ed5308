//! Error types for the utf8conv library.
//!
//! A batch never fails as a whole. Every file produces exactly one outcome:
//! a [`crate::output::ConversionResult`] or a [`ConvertError`] explaining
//! why that one file could not be converted.
//!
//! Degraded-but-successful paths are deliberately *not* errors:
//!
//! * an unknown forced encoding decodes as UTF-8 with confidence `0.0`;
//! * undecodable byte sequences become U+FFFD;
//! * a failed language detection leaves the tag empty.
//!
//! Those are reported through the fields of the result instead.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal error for a single file.
///
/// Returned from [`crate::convert::convert_file`] and stored in
/// [`crate::output::FileOutcome`] by the batch runners; other files in the
/// same batch are unaffected.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// Source file was not found at the given path.
    #[error("Source file not found: '{path}'")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the source.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The source path exists but is a directory or other non-regular file.
    #[error("Not a regular file: '{path}'")]
    NotAFile { path: PathBuf },

    /// Any other I/O failure while reading the source.
    #[error("Failed to read '{path}': {source}")]
    SourceReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Destination errors ────────────────────────────────────────────────
    /// The output folder could not be created.
    #[error("Failed to create output folder '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The `.bak` copy of the pre-existing target could not be made.
    #[error("Failed to back up '{path}' to '{backup}': {source}")]
    BackupFailed {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The UTF-8 content could not be written to the target.
    #[error("Failed to write output file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Rename errors ─────────────────────────────────────────────────────
    /// The language-tag rename failed. The UTF-8 content stays at `path`.
    #[error("Failed to rename '{path}' to '{target}': {source}\nConverted content was kept at '{path}'.")]
    RenameFailed {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every numbered candidate up to the configured bound already exists.
    #[error("No free name for '{path}' with suffix '-{suffix}' after {attempts} attempts\nConverted content was kept at '{path}'.")]
    RenameExhausted {
        path: PathBuf,
        suffix: String,
        attempts: usize,
    },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Another source earlier in the same batch already writes to this target.
    #[error("'{path}' would overwrite '{target}', already produced from '{first}' in this batch")]
    DuplicateTarget {
        path: PathBuf,
        target: PathBuf,
        first: PathBuf,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a worker task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Short machine-readable kind, used in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::SourceNotFound { .. } => "source_not_found",
            ConvertError::PermissionDenied { .. } => "permission_denied",
            ConvertError::NotAFile { .. } => "not_a_file",
            ConvertError::SourceReadFailed { .. } => "source_read_failed",
            ConvertError::OutputDirFailed { .. } => "output_dir_failed",
            ConvertError::BackupFailed { .. } => "backup_failed",
            ConvertError::WriteFailed { .. } => "write_failed",
            ConvertError::RenameFailed { .. } => "rename_failed",
            ConvertError::RenameExhausted { .. } => "rename_exhausted",
            ConvertError::DuplicateTarget { .. } => "duplicate_target",
            ConvertError::InvalidConfig(_) => "invalid_config",
            ConvertError::Internal(_) => "internal",
        }
    }

    /// Classify a read error on `path` into the most specific variant.
    pub(crate) fn from_read(path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => ConvertError::SourceNotFound { path },
            std::io::ErrorKind::PermissionDenied => ConvertError::PermissionDenied { path },
            _ => ConvertError::SourceReadFailed { path, source },
        }
    }
}
