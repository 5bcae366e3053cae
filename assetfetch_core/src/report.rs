use std::process::ExitCode;

use crate::types::types::{DownloadError, DownloadTask};

/// Process-level outcome of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    /// Bad arguments or an unusable catalog; nothing was fetched.
    Usage = 1,
    /// At least one task exhausted its attempts.
    PartialFailure = 2,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// A task that ended without a file, with the error from its last attempt.
#[derive(Debug)]
pub struct FailedTask {
    pub task: DownloadTask,
    pub attempts: u32,
    pub last_error: DownloadError,
}

/// Classification of every task in a batch. Each task lands in exactly one
/// of `succeeded` or `failed`, in catalog order.
#[derive(Debug, Default)]
pub struct BatchResult {
    succeeded: Vec<DownloadTask>,
    failed: Vec<FailedTask>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&mut self, task: DownloadTask) {
        self.succeeded.push(task);
    }

    pub(crate) fn record_failure(&mut self, failure: FailedTask) {
        self.failed.push(failure);
    }

    pub fn succeeded(&self) -> &[DownloadTask] {
        &self.succeeded
    }

    pub fn failed(&self) -> &[FailedTask] {
        &self.failed
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn exit_status(&self) -> ExitStatus {
        if self.is_success() {
            ExitStatus::Success
        } else {
            ExitStatus::PartialFailure
        }
    }

    /// End-of-batch summary. One line per failed task, prefixed by a header,
    /// or a single completion line when nothing failed.
    pub fn summary_lines(&self) -> Vec<String> {
        if self.is_success() {
            return vec![format!("All {} downloads completed.", self.succeeded.len())];
        }

        let mut lines = Vec::with_capacity(self.failed.len() + 1);
        lines.push(format!(
            "{} of {} downloads failed after retries:",
            self.failed.len(),
            self.total()
        ));
        for failure in &self.failed {
            lines.push(format!(
                "{} {}: {} -> {} ({} attempts, last error: {})",
                failure.task.group,
                failure.task.name,
                failure.task.source_url,
                failure.task.destination.display(),
                failure.attempts,
                failure.last_error
            ));
        }
        lines
    }
}
