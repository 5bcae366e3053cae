#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assetfetch_core::downloader::fetcher::Fetch;
use assetfetch_core::downloader::retry::TaskOutcome;
use assetfetch_core::progress::BatchObserver;
use assetfetch_core::report::BatchResult;
use assetfetch_core::types::types::{DownloadError, DownloadTask, Fetched};

/// Generates deterministic test data.
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Mounts `/hop/0 -> /hop/1 -> ... -> /hop/{hops}` where every step is a 302
/// with a relative `Location`, and the last one serves `body` with 200.
pub async fn mount_redirect_chain(server: &MockServer, hops: u32, body: Vec<u8>) {
    for i in 0..hops {
        Mock::given(method("GET"))
            .and(path(format!("/hop/{}", i)))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("/hop/{}", i + 1)),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(format!("/hop/{}", hops)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    AttemptFailed {
        task: String,
        attempt: u32,
        wait: Option<Duration>,
    },
    Finished {
        task: String,
        ok: bool,
    },
    BatchComplete {
        succeeded: usize,
        failed: usize,
    },
}

/// Observer that records every event it sees, in order.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Event>>>,
    bytes: Arc<Mutex<u64>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn bytes(&self) -> u64 {
        *self.bytes.lock().unwrap()
    }

    pub fn waits(&self) -> Vec<Option<Duration>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::AttemptFailed { wait, .. } => Some(wait),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BatchObserver for RecordingObserver {
    async fn on_task_start(&self, task: &DownloadTask) {
        self.events.lock().unwrap().push(Event::Start(task.name.clone()));
    }

    fn on_bytes(&self, _task: &DownloadTask, bytes: u64) {
        *self.bytes.lock().unwrap() += bytes;
    }

    async fn on_attempt_failed(
        &self,
        task: &DownloadTask,
        attempt: u32,
        _error: &DownloadError,
        wait: Option<Duration>,
    ) {
        self.events.lock().unwrap().push(Event::AttemptFailed {
            task: task.name.clone(),
            attempt,
            wait,
        });
    }

    async fn on_task_finished(&self, task: &DownloadTask, outcome: &TaskOutcome) {
        self.events.lock().unwrap().push(Event::Finished {
            task: task.name.clone(),
            ok: outcome.is_ok(),
        });
    }

    async fn on_batch_complete(&self, result: &BatchResult) {
        self.events.lock().unwrap().push(Event::BatchComplete {
            succeeded: result.succeeded().len(),
            failed: result.failed().len(),
        });
    }
}

/// In-memory fetcher that plays back a fixed script of results, then keeps
/// repeating `fallback`. Never touches the file system.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<(), u16>>>,
    fallback: Result<(), u16>,
    calls: AtomicU32,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<(), u16>>, fallback: Result<(), u16>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_status(code: u16) -> Self {
        Self::new(Vec::new(), Err(code))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for ScriptedFetcher {
    async fn fetch(
        &self,
        url: &str,
        _dest: &Path,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<Fetched, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        match next {
            Ok(()) => {
                on_progress(16);
                Ok(Fetched {
                    final_url: url.to_string(),
                    bytes_written: 16,
                    hops: 0,
                })
            }
            Err(code) => Err(DownloadError::HttpStatus {
                code,
                url: url.to_string(),
            }),
        }
    }
}

/// Fetcher whose every attempt fails as if the destination could not be
/// written.
#[derive(Default)]
pub struct DiskFailingFetcher {
    calls: AtomicU32,
}

impl DiskFailingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for DiskFailingFetcher {
    async fn fetch(
        &self,
        _url: &str,
        dest: &Path,
        _cancel: &CancellationToken,
        _on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<Fetched, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DownloadError::Disk(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("cannot create {}", dest.display()),
        )))
    }
}
