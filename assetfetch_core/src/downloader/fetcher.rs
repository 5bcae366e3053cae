use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, StatusCode, Url};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::types::types::{DownloadError, Fetched};

/// Five hops are followed; the sixth fails with `RedirectLoop`.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Write buffer in front of the destination file (256 KB).
const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Performs a single fetch of `url` into `dest`.
///
/// Implementations must leave nothing at `dest` when they return an error,
/// so that the next attempt starts from a clean state.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<Fetched, DownloadError>;
}

/// HTTP fetcher that follows `3xx` + `Location` itself so hops can be counted
/// and bounded, then streams a final `200` body to disk.
pub struct RedirectFetcher {
    client: Client,
    max_redirects: u32,
}

pub struct RedirectFetcherBuilder {
    max_redirects: u32,
    request_timeout: Option<Duration>,
    connect_timeout: Duration,
}

impl RedirectFetcher {
    pub fn new() -> Result<Self, DownloadError> {
        Self::builder().build()
    }

    pub fn builder() -> RedirectFetcherBuilder {
        RedirectFetcherBuilder::new()
    }

    async fn follow_and_write(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<Fetched, DownloadError> {
        let mut current =
            Url::parse(url).map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", url, e)))?;
        let mut hops: u32 = 0;

        loop {
            log::info!("[fetch] GET {} (hop {})", current, hops);

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                sent = self.client.get(current.clone()).send() => sent?,
            };
            let status = response.status();

            if status.is_redirection() {
                if let Some(location) = response.headers().get(LOCATION) {
                    let location = location.to_str().map_err(|_| {
                        DownloadError::InvalidUrl(format!("non-ascii Location header from {}", current))
                    })?;
                    // Relative locations resolve against the URL that produced them.
                    let next = current.join(location).map_err(|e| {
                        DownloadError::InvalidUrl(format!("{}: {}", location, e))
                    })?;

                    hops += 1;
                    if hops > self.max_redirects {
                        return Err(DownloadError::RedirectLoop {
                            hops,
                            url: url.to_string(),
                        });
                    }

                    log::debug!("[fetch] {} redirected ({}) to {}", current, status, next);
                    // Body of a redirect is never read.
                    drop(response);
                    current = next;
                    continue;
                }
            }

            if status != StatusCode::OK {
                return Err(DownloadError::HttpStatus {
                    code: status.as_u16(),
                    url: current.to_string(),
                });
            }

            let bytes_written = write_body(response, dest, cancel, on_progress).await?;
            log::info!(
                "[fetch] {} -> {} ({} bytes, {} hops)",
                current,
                dest.display(),
                bytes_written,
                hops
            );

            return Ok(Fetched {
                final_url: current.to_string(),
                bytes_written,
                hops,
            });
        }
    }
}

#[async_trait]
impl Fetch for RedirectFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<Fetched, DownloadError> {
        let result = self.follow_and_write(url, dest, cancel, on_progress).await;
        if result.is_err() {
            remove_partial(dest).await;
        }
        result
    }
}

impl RedirectFetcherBuilder {
    pub fn new() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Bounds the whole request, body included. `None` waits forever.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<RedirectFetcher, DownloadError> {
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(self.connect_timeout)
            .tcp_nodelay(true);
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(RedirectFetcher {
            client: builder.build()?,
            max_redirects: self.max_redirects,
        })
    }
}

impl Default for RedirectFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Streams the response body into `dest`, creating parent directories first.
/// Returns once the data is flushed and synced.
async fn write_body(
    response: reqwest::Response,
    dest: &Path,
    cancel: &CancellationToken,
    on_progress: &(dyn Fn(u64) + Send + Sync),
) -> Result<u64, DownloadError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let file = tokio::fs::File::create(dest).await?;
    let mut writer = tokio::io::BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;

        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
        on_progress(chunk.len() as u64);
    }

    writer.flush().await?;
    writer.into_inner().sync_all().await?;

    Ok(written)
}

async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => log::debug!("[fetch] removed partial file {}", dest.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("[fetch] could not remove {}: {}", dest.display(), e),
    }
}
