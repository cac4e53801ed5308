//! Progress-callback trait for per-file conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the batch runner processes each file.
//!
//! # Example
//!
//! ```rust
//! use utf8conv::{ConversionConfig, ConversionProgressCallback, ConversionResult};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, result: &ConversionResult) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total}: {}", result.final_path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ConvertError;
use crate::output::ConversionResult;
use std::path::Path;
use std::sync::Arc;

/// Called by the batch runners as they process each file.
///
/// Files are converted concurrently, so `on_file_*` methods may be called
/// from several threads at once and in any order; `index` (0-based position
/// in the submitted list) identifies the file. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any file is read.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before a file is read.
    fn on_file_start(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called when a file converted successfully.
    fn on_file_complete(&self, index: usize, total: usize, result: &ConversionResult) {
        let _ = (index, total, result);
    }

    /// Called when a file failed.
    fn on_file_error(&self, index: usize, total: usize, path: &Path, error: &ConvertError) {
        let _ = (index, total, path, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
