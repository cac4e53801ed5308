//! Streaming batch API: emit per-file outcomes as they complete.
//!
//! [`crate::convert::convert_batch`] returns only after every file is done.
//! [`convert_stream`] yields each [`FileOutcome`] as soon as its worker
//! finishes, so callers can report progress or react to failures while the
//! rest of the batch is still running. Outcomes arrive in completion order;
//! `FileOutcome::index` ties each one back to its input.
//!
//! Per-file progress callbacks fire exactly as in the eager API. The batch
//! start/complete callbacks do not, since the caller decides when the
//! stream is finished.

use crate::config::ConversionConfig;
use crate::convert::{BatchContext, BatchPlan};
use crate::output::FileOutcome;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file outcomes.
pub type FileStream = Pin<Box<dyn Stream<Item = FileOutcome> + Send>>;

/// Convert `paths`, streaming one outcome per input as each completes.
///
/// Inputs rejected before any I/O (targets shared with an earlier input)
/// come first. Must be polled inside a tokio runtime.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use utf8conv::{convert_stream, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = ConversionConfig::default();
/// let mut outcomes = convert_stream(["a.srt", "b.srt"], &config);
/// while let Some(outcome) = outcomes.next().await {
///     println!("#{} ok={}", outcome.index, outcome.is_success());
/// }
/// # }
/// ```
pub fn convert_stream<I, P>(paths: I, config: &ConversionConfig) -> FileStream
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let plan = BatchPlan::new(paths, config);
    let total = plan.total();
    info!("Starting streaming batch of {} files", total);

    let ctx = Arc::new(BatchContext::new(config, total));
    for o in &plan.rejected {
        ctx.report(o);
    }

    let workers = stream::iter(plan.jobs)
        .map(move |(index, path)| {
            let ctx = Arc::clone(&ctx);
            async move { ctx.run(index, path).await }
        })
        .buffer_unordered(config.concurrency.max(1));

    Box::pin(stream::iter(plan.rejected).chain(workers))
}
