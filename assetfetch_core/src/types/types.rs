use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Which output directory a catalog entry lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetGroup {
    #[default]
    Asset,
    Testimonial,
}

impl fmt::Display for AssetGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetGroup::Asset => f.write_str("asset"),
            AssetGroup::Testimonial => f.write_str("testimonial"),
        }
    }
}

/// One resolved asset to fetch. Built once from the catalog and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadTask {
    pub name: String,
    pub source_url: String,
    pub destination: PathBuf,
    pub group: AssetGroup,
}

impl DownloadTask {
    pub fn new(
        name: impl Into<String>,
        source_url: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            destination: destination.into(),
            group: AssetGroup::Asset,
        }
    }

    pub fn with_group(mut self, group: AssetGroup) -> Self {
        self.group = group;
        self
    }

    /// Label used in progress lines, e.g. `hero` or `testimonial sarah`.
    pub fn label(&self) -> String {
        match self.group {
            AssetGroup::Asset => self.name.clone(),
            AssetGroup::Testimonial => format!("testimonial {}", self.name),
        }
    }
}

/// What a single fetch attempt ended with.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Fetched),
    TransientFailure(DownloadError),
    FatalFailure(DownloadError),
}

/// One try inside the retry loop. Never outlives it.
#[derive(Debug)]
pub struct Attempt {
    /// 1-based.
    pub number: u32,
    pub outcome: AttemptOutcome,
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub final_url: String,
    pub bytes_written: u64,
    pub hops: u32,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {code} from {url}")]
    HttpStatus { code: u16, url: String },

    #[error("too many redirects ({hops}) while fetching {url}")]
    RedirectLoop { hops: u32, url: String },

    #[error("disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// True for failures that retrying cannot fix: client-side statuses
    /// (except 408 and 429) and malformed URLs.
    pub fn is_permanent(&self) -> bool {
        match self {
            DownloadError::HttpStatus { code, .. } => {
                (400..500).contains(code) && *code != 408 && *code != 429
            }
            DownloadError::InvalidUrl(_) | DownloadError::Cancelled => true,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid size {0:?}, expected WIDTHxHEIGHT")]
    InvalidSize(String),

    #[error("invalid url {0:?}")]
    InvalidUrl(String),

    #[error("tasks {first:?} and {second:?} both write to {}", path.display())]
    DuplicateDestination {
        first: String,
        second: String,
        path: PathBuf,
    },
}
