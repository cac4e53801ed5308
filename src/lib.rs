//! # utf8conv
//!
//! Batch-convert text files of unknown or mixed encodings to UTF-8.
//!
//! Subtitle dumps, old CSV exports and log files arrive as Windows-1252,
//! Shift_JIS, GB18030, UTF-16 or already-mangled UTF-8. This crate sniffs
//! each file's encoding, decodes it without ever failing on bad bytes,
//! repairs common mojibake, rewrites it as UTF-8 (keeping a `.bak` of the
//! original), and tags the file name with the detected language.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Target   in place, or <output folder>/<file name>
//!  ├─ 2. Read     whole file into memory
//!  ├─ 3. Decode   BOM / forced label / chardetng guess + confidence
//!  ├─ 4. Repair   mojibake, C1 controls, ligatures, line breaks
//!  ├─ 5. Write    .bak copy (in place only) + atomic UTF-8 write
//!  └─ 6. Tag      lingua language guess → notes-fra.txt
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use utf8conv::{convert_batch, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ConversionConfig::default();
//!     let output = convert_batch(["movie.srt", "notes.txt"], &config).await;
//!     for result in output.successes() {
//!         println!(
//!             "{} → {} ({} @ {:.2})",
//!             result.source_path.display(),
//!             result.final_path.display(),
//!             result.encoding_used,
//!             result.confidence
//!         );
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `utf8conv` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! utf8conv = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;
pub mod suffixes;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ConversionRequest, ForcedEncoding};
pub use convert::{convert_batch, convert_batch_sync, convert_file};
pub use error::ConvertError;
pub use output::{BatchOutput, BatchStats, ConversionResult, FileOutcome};
pub use pipeline::language::{LanguageCandidate, LanguageIdentifier, LanguageTagger, LinguaIdentifier};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, FileStream};
pub use suffixes::SuffixTable;
