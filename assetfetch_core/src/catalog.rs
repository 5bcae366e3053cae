use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use serde::Deserialize;

use crate::types::types::{AssetGroup, CatalogError, DownloadTask};

pub const DEFAULT_BASE_URL: &str = "https://picsum.photos";

/// Characters left as-is inside a seed segment; everything else is escaped.
const SEED_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Destination roots for each asset group. Passed in explicitly; nothing is
/// derived from the process working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirs {
    pub assets_dir: PathBuf,
    pub testimonials_dir: PathBuf,
}

impl Default for OutputDirs {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            testimonials_dir: PathBuf::from("testimonials"),
        }
    }
}

impl OutputDirs {
    /// Both directories under a common root, e.g. `public/assets`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            assets_dir: root.join("assets"),
            testimonials_dir: root.join("testimonials"),
        }
    }

    pub fn dir_for(&self, group: AssetGroup) -> &Path {
        match group {
            AssetGroup::Asset => &self.assets_dir,
            AssetGroup::Testimonial => &self.testimonials_dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub base_url: String,
    pub dirs: OutputDirs,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            dirs: OutputDirs::default(),
        }
    }
}

/// Target image size. Parses `WIDTHxHEIGHT` or `WIDTH/HEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FromStr for Dimensions {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CatalogError::InvalidSize(s.to_string());
        let (w, h) = s
            .trim()
            .split_once(['x', 'X', '/'])
            .ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Dimensions {
    type Error = CatalogError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One logical asset: a name, the seed that picks the image, and its size.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub seed: String,
    pub size: Dimensions,
    #[serde(default)]
    pub group: AssetGroup,
}

impl CatalogEntry {
    pub fn new(name: &str, seed: &str, size: Dimensions, group: AssetGroup) -> Self {
        Self {
            name: name.to_string(),
            seed: seed.to_string(),
            size,
            group,
        }
    }

    /// `<base>/seed/<encoded seed>/<width>/<height>.jpg`
    pub fn source_url(&self, base_url: &str) -> Result<String, CatalogError> {
        let invalid = || CatalogError::InvalidUrl(base_url.to_string());
        let mut url = Url::parse(base_url).map_err(|_| invalid())?;
        if url.cannot_be_a_base() {
            return Err(invalid());
        }

        let path = format!(
            "{}/seed/{}/{}/{}.jpg",
            url.path().trim_end_matches('/'),
            utf8_percent_encode(&self.seed, SEED_ESCAPE),
            self.size.width,
            self.size.height
        );
        url.set_path(&path);
        Ok(url.to_string())
    }

    pub fn destination(&self, dirs: &OutputDirs) -> PathBuf {
        dirs.dir_for(self.group).join(format!("{}.jpg", self.name))
    }

    pub fn resolve(&self, config: &CatalogConfig) -> Result<DownloadTask, CatalogError> {
        Ok(DownloadTask::new(
            self.name.clone(),
            self.source_url(&config.base_url)?,
            self.destination(&config.dirs),
        )
        .with_group(self.group))
    }
}

/// Ordered list of catalog entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

const PORTFOLIO: Dimensions = Dimensions::new(800, 600);
const BLOG: Dimensions = Dimensions::new(800, 520);
const AVATAR: Dimensions = Dimensions::new(400, 400);

impl Catalog {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// The placeholder imagery used by the site.
    pub fn builtin() -> Self {
        use AssetGroup::{Asset, Testimonial};

        let entries = [
            ("hero", "studio-workspace", Dimensions::new(1200, 700), Asset),
            ("about", "creative-portrait", Dimensions::new(1000, 700), Asset),
            ("portfolio-1", "ecommerce-ui", PORTFOLIO, Asset),
            ("portfolio-2", "restaurant-interior", PORTFOLIO, Asset),
            ("portfolio-3", "mobile-app", PORTFOLIO, Asset),
            ("portfolio-4", "photography-gallery", PORTFOLIO, Asset),
            ("portfolio-5", "online-course", PORTFOLIO, Asset),
            ("portfolio-6", "crypto-dashboard", PORTFOLIO, Asset),
            ("blog-1", "design-process", BLOG, Asset),
            ("blog-2", "product-launch", BLOG, Asset),
            ("blog-3", "mobile-tutorial", BLOG, Asset),
            ("blog-4", "photography-tips", BLOG, Asset),
            ("blog-5", "education-platform", BLOG, Asset),
            ("blog-6", "market-analysis", BLOG, Asset),
            ("sarah", "sarah-profile", AVATAR, Testimonial),
            ("ahmed", "ahmed-profile", AVATAR, Testimonial),
            ("maria", "maria-profile", AVATAR, Testimonial),
        ]
        .into_iter()
        .map(|(name, seed, size, group)| CatalogEntry::new(name, seed, size, group))
        .collect();

        Self { entries }
    }

    /// Parses a JSON array of `{name, seed, size, group?}` objects.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&json)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves every entry to a task, in catalog order. Two entries that map
    /// to the same destination are rejected.
    pub fn resolve(&self, config: &CatalogConfig) -> Result<Vec<DownloadTask>, CatalogError> {
        let tasks = self
            .entries
            .iter()
            .map(|entry| entry.resolve(config))
            .collect::<Result<Vec<_>, _>>()?;
        check_unique_destinations(&tasks)?;
        Ok(tasks)
    }
}

/// Builds the task for a bare `(url, destination)` pair. The task is named
/// after the destination's file stem.
pub fn single_task(url: &str, destination: impl Into<PathBuf>) -> Result<DownloadTask, CatalogError> {
    Url::parse(url).map_err(|_| CatalogError::InvalidUrl(url.to_string()))?;
    let destination = destination.into();
    let name = destination
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| url.to_string());
    Ok(DownloadTask::new(name, url, destination))
}

fn check_unique_destinations(tasks: &[DownloadTask]) -> Result<(), CatalogError> {
    let mut seen: HashMap<&Path, &str> = HashMap::with_capacity(tasks.len());
    for task in tasks {
        if let Some(first) = seen.insert(&task.destination, &task.name) {
            return Err(CatalogError::DuplicateDestination {
                first: first.to_string(),
                second: task.name.clone(),
                path: task.destination.clone(),
            });
        }
    }
    Ok(())
}
