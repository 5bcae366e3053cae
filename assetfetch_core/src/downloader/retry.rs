use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::downloader::fetcher::Fetch;
use crate::progress::BatchNotifier;
use crate::types::types::{Attempt, AttemptOutcome, DownloadError, DownloadTask, Fetched};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_CAP_DELAY: Duration = Duration::from_millis(15000);

/// Which failures the policy is willing to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryMode {
    /// Every failure is retried until attempts run out.
    #[default]
    All,
    /// Failures for which `DownloadError::is_permanent` holds end the task
    /// immediately.
    TransientOnly,
}

/// Bounded retry loop with capped exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub cap_delay: Duration,
    pub mode: RetryMode,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            cap_delay: DEFAULT_CAP_DELAY,
            mode: RetryMode::All,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, base_delay: Duration, cap_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.cap_delay = cap_delay;
        self
    }

    pub fn with_mode(mut self, mode: RetryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Wait before the next attempt, given the 1-based index of the attempt
    /// that just failed: `min(base * 2^(n-1), cap)`.
    pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.cap_delay)
            .min(self.cap_delay)
    }

    /// Sorts a failed attempt into retryable or terminal.
    pub fn classify(&self, error: DownloadError) -> AttemptOutcome {
        match error {
            DownloadError::Cancelled => AttemptOutcome::FatalFailure(error),
            e if self.mode == RetryMode::TransientOnly && e.is_permanent() => {
                AttemptOutcome::FatalFailure(e)
            }
            e => AttemptOutcome::TransientFailure(e),
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSuccess {
    pub attempts: u32,
    pub fetched: Fetched,
}

#[derive(Debug)]
pub struct TaskFailure {
    pub attempts: u32,
    pub last_error: DownloadError,
}

pub type TaskOutcome = Result<TaskSuccess, TaskFailure>;

/// Runs `task` through `fetcher` until it succeeds, the policy gives up, or
/// `cancel` fires. One attempt is in flight at a time.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetch,
    task: &DownloadTask,
    policy: &RetryPolicy,
    notifier: &BatchNotifier,
    cancel: &CancellationToken,
) -> TaskOutcome {
    let max_attempts = policy.attempts();
    let on_progress = |bytes: u64| notifier.bytes(task, bytes);
    let mut number: u32 = 0;

    loop {
        number += 1;
        let result = fetcher
            .fetch(&task.source_url, &task.destination, cancel, &on_progress)
            .await;

        let attempt = Attempt {
            number,
            outcome: match result {
                Ok(fetched) => AttemptOutcome::Success(fetched),
                Err(e) => policy.classify(e),
            },
        };

        let error = match attempt.outcome {
            AttemptOutcome::Success(fetched) => {
                return Ok(TaskSuccess {
                    attempts: attempt.number,
                    fetched,
                });
            }
            AttemptOutcome::FatalFailure(error) => {
                log::warn!(
                    "Attempt {} failed for {} ({}): {}. Not retrying.",
                    attempt.number,
                    task.name,
                    task.source_url,
                    error
                );
                notifier.attempt_failed(task, attempt.number, &error, None).await;
                return Err(TaskFailure {
                    attempts: attempt.number,
                    last_error: error,
                });
            }
            AttemptOutcome::TransientFailure(error) => error,
        };

        if attempt.number >= max_attempts {
            log::warn!(
                "Attempt {}/{} failed for {} ({}): {}. Giving up.",
                attempt.number,
                max_attempts,
                task.name,
                task.source_url,
                error
            );
            notifier.attempt_failed(task, attempt.number, &error, None).await;
            return Err(TaskFailure {
                attempts: attempt.number,
                last_error: error,
            });
        }

        let wait = policy.backoff_delay(attempt.number);
        log::warn!(
            "Attempt {}/{} failed for {} ({}): {}. Retrying in {}ms...",
            attempt.number,
            max_attempts,
            task.name,
            task.source_url,
            error,
            wait.as_millis()
        );
        notifier.attempt_failed(task, attempt.number, &error, Some(wait)).await;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(TaskFailure {
                    attempts: attempt.number,
                    last_error: DownloadError::Cancelled,
                });
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }
}
