use std::time::Duration;

use async_trait::async_trait;

use crate::downloader::retry::TaskOutcome;
use crate::report::BatchResult;
use crate::types::types::{DownloadError, DownloadTask};

/// Trait for anything that wants to follow a batch as it runs.
///
/// Lifecycle, per task in catalog order:
/// - `on_task_start` once before the first attempt.
/// - `on_bytes` for every body chunk written (any attempt).
/// - `on_attempt_failed` once per failed attempt. `wait` is the backoff
///   before the next attempt, or `None` when no attempt follows.
/// - `on_task_finished` once with the final outcome.
///
/// `on_batch_complete` is called once after the last task.
#[async_trait]
pub trait BatchObserver: Send + Sync + 'static {
    async fn on_task_start(&self, task: &DownloadTask);

    /// Called from inside the body stream loop, so it must not block.
    fn on_bytes(&self, _task: &DownloadTask, _bytes: u64) {}

    async fn on_attempt_failed(
        &self,
        task: &DownloadTask,
        attempt: u32,
        error: &DownloadError,
        wait: Option<Duration>,
    );

    async fn on_task_finished(&self, task: &DownloadTask, outcome: &TaskOutcome);

    async fn on_batch_complete(&self, result: &BatchResult);
}
