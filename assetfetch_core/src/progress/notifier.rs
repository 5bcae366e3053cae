use std::time::Duration;

use super::observer::BatchObserver;
use crate::downloader::retry::TaskOutcome;
use crate::report::BatchResult;
use crate::types::types::{DownloadError, DownloadTask};

/// Fans batch events out to every registered observer, in registration order.
#[derive(Default)]
pub struct BatchNotifier {
    observers: Vec<Box<dyn BatchObserver>>,
}

impl BatchNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Must be called before the batch starts.
    pub fn add_observer(&mut self, observer: Box<dyn BatchObserver>) {
        self.observers.push(observer);
    }

    pub async fn task_started(&self, task: &DownloadTask) {
        for observer in &self.observers {
            observer.on_task_start(task).await;
        }
    }

    pub fn bytes(&self, task: &DownloadTask, bytes: u64) {
        for observer in &self.observers {
            observer.on_bytes(task, bytes);
        }
    }

    pub async fn attempt_failed(
        &self,
        task: &DownloadTask,
        attempt: u32,
        error: &DownloadError,
        wait: Option<Duration>,
    ) {
        for observer in &self.observers {
            observer.on_attempt_failed(task, attempt, error, wait).await;
        }
    }

    pub async fn task_finished(&self, task: &DownloadTask, outcome: &TaskOutcome) {
        for observer in &self.observers {
            observer.on_task_finished(task, outcome).await;
        }
    }

    pub async fn batch_complete(&self, result: &BatchResult) {
        for observer in &self.observers {
            observer.on_batch_complete(result).await;
        }
    }
}
