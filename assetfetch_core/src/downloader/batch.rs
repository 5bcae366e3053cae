use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::downloader::fetcher::Fetch;
use crate::downloader::retry::{fetch_with_retry, RetryPolicy, TaskFailure};
use crate::progress::{BatchNotifier, BatchObserver};
use crate::report::{BatchResult, FailedTask};
use crate::types::types::{DownloadError, DownloadTask};

/// Drives a list of tasks one at a time, in order, through the retry policy.
///
/// Tasks never run concurrently: each one reaches success or exhaustion
/// before the next starts, and a failed task never stops the batch.
pub struct BatchRunner {
    fetcher: Arc<dyn Fetch>,
    policy: RetryPolicy,
    notifier: BatchNotifier,
    cancel_token: CancellationToken,
}

impl BatchRunner {
    pub fn new(fetcher: Arc<dyn Fetch>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            policy,
            notifier: BatchNotifier::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Register an observer. Must be called before `run()`.
    pub fn add_observer(&mut self, observer: Box<dyn BatchObserver>) {
        self.notifier.add_observer(observer);
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Stops the in-flight attempt; every unfinished task is recorded as
    /// failed with `DownloadError::Cancelled`.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub async fn run(&self, tasks: &[DownloadTask]) -> BatchResult {
        let mut result = BatchResult::new();

        for task in tasks {
            let outcome = if self.cancel_token.is_cancelled() {
                Err(TaskFailure {
                    attempts: 0,
                    last_error: DownloadError::Cancelled,
                })
            } else {
                self.notifier.task_started(task).await;
                fetch_with_retry(
                    self.fetcher.as_ref(),
                    task,
                    &self.policy,
                    &self.notifier,
                    &self.cancel_token,
                )
                .await
            };

            self.notifier.task_finished(task, &outcome).await;

            match outcome {
                Ok(success) => {
                    log::info!(
                        "[batch] {} done after {} attempt(s), {} bytes",
                        task.name,
                        success.attempts,
                        success.fetched.bytes_written
                    );
                    result.record_success(task.clone());
                }
                Err(failure) => {
                    log::info!(
                        "[batch] {} failed after {} attempt(s): {}",
                        task.name,
                        failure.attempts,
                        failure.last_error
                    );
                    result.record_failure(FailedTask {
                        task: task.clone(),
                        attempts: failure.attempts,
                        last_error: failure.last_error,
                    });
                }
            }
        }

        self.notifier.batch_complete(&result).await;
        result
    }
}
