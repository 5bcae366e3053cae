use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use indicatif::HumanBytes;

use assetfetch_core::downloader::retry::TaskOutcome;
use assetfetch_core::progress::BatchObserver;
use assetfetch_core::report::BatchResult;
use assetfetch_core::types::types::{DownloadError, DownloadTask};

/// Prints `Downloading <name> from <url>... ` when a task starts and
/// `done|failed` when it ends, then the failure summary after the batch.
///
/// Retry warnings for a task land between its prefix and its outcome.
pub struct TerminalObserver {
    received: AtomicU64,
}

impl TerminalObserver {
    pub fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
        }
    }
}

/// `Downloading <label> from <url>... `, without the outcome.
fn progress_prefix(task: &DownloadTask) -> String {
    format!("Downloading {} from {}... ", task.label(), task.source_url)
}

fn outcome_word(outcome: &TaskOutcome) -> &'static str {
    if outcome.is_ok() {
        "done"
    } else {
        "failed"
    }
}

#[async_trait]
impl BatchObserver for TerminalObserver {
    async fn on_task_start(&self, task: &DownloadTask) {
        self.received.store(0, Ordering::Relaxed);
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{}", progress_prefix(task));
        let _ = stdout.flush();
    }

    fn on_bytes(&self, _task: &DownloadTask, bytes: u64) {
        self.received.fetch_add(bytes, Ordering::Relaxed);
    }

    async fn on_attempt_failed(
        &self,
        _task: &DownloadTask,
        _attempt: u32,
        _error: &DownloadError,
        _wait: Option<Duration>,
    ) {
        // Only the last attempt's bytes count.
        self.received.store(0, Ordering::Relaxed);
    }

    async fn on_task_finished(&self, task: &DownloadTask, outcome: &TaskOutcome) {
        println!("{}", outcome_word(outcome));
        if outcome.is_ok() {
            log::info!(
                "{}: {} written to {}",
                task.name,
                HumanBytes(self.received.load(Ordering::Relaxed)),
                task.destination.display()
            );
        }
    }

    async fn on_batch_complete(&self, result: &BatchResult) {
        let lines = result.summary_lines();
        if result.is_success() {
            for line in lines {
                println!("{}", line);
            }
        } else {
            for line in lines {
                eprintln!("{}", line);
            }
        }
    }
}
