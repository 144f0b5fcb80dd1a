// Clip catalog providers
// Produce the ordered list of clip identifiers and the bytes behind each one

use async_trait::async_trait;
use reqwest::Url;
use std::path::{Component, Path, PathBuf};

use super::scanner::DirectoryScanner;
use crate::error::{Result, SoundboardError};

/// The compiled-in sound set
pub const BUILTIN_CLIPS: &[&str] = &[
    "Desert Eagle Gunshot Sound Effect.mp3",
    "Die Feldlerche Vogel des Jahres 2019.mp3",
    "Human Whistling Sound Effect 10.mp3",
    "Mendelssohn Wedding March.mp3",
    "Nightingale Songs.mp3",
    "Old Phone Ringtone.mp3",
];

#[async_trait]
pub trait ClipCatalogProvider: Send + Sync {
    /// Identifiers to load, in display order. Re-invoke to refresh.
    async fn list_clips(&self) -> Result<Vec<String>>;

    /// Raw (still encoded) bytes of one clip
    async fn fetch_clip(&self, id: &str) -> Result<Vec<u8>>;

    /// Where clips come from, for logs
    fn describe(&self) -> String;
}

/// Fixed identifiers, bytes read from a local directory
pub struct StaticList {
    ids: Vec<String>,
    root: PathBuf,
}

impl StaticList {
    pub fn new(ids: Vec<String>, root: impl Into<PathBuf>) -> Self {
        Self { ids, root: root.into() }
    }

    pub fn builtin(root: impl Into<PathBuf>) -> Self {
        Self::new(BUILTIN_CLIPS.iter().map(|s| s.to_string()).collect(), root)
    }

    /// Snapshot whatever sound files the directory holds right now
    pub fn from_dir(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let ids = DirectoryScanner::scan(&root)
            .map_err(|e| SoundboardError::Listing(format!("{}: {}", root.display(), e)))?;
        Ok(Self { ids, root })
    }
}

#[async_trait]
impl ClipCatalogProvider for StaticList {
    async fn list_clips(&self) -> Result<Vec<String>> {
        Ok(self.ids.clone())
    }

    async fn fetch_clip(&self, id: &str) -> Result<Vec<u8>> {
        let fetch_error = |reason: String| SoundboardError::Fetch { id: id.to_string(), reason };
        let path = safe_join(&self.root, id).ok_or_else(|| fetch_error("invalid clip name".to_string()))?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| fetch_error(format!("{}: {}", path.display(), e)))
    }

    fn describe(&self) -> String {
        format!("{} clips from {}", self.ids.len(), self.root.display())
    }
}

/// Asks a soundboard server for its listing and streams clips over HTTP
pub struct RemoteListing {
    base: Url,
    client: reqwest::Client,
}

impl RemoteListing {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base)
            .map_err(|e| SoundboardError::Listing(format!("invalid server url {}: {}", base, e)))?;
        if base.cannot_be_a_base() {
            return Err(SoundboardError::Listing(format!("{} cannot be used as a base url", base)));
        }
        // Url::join treats a path without a trailing slash as a file
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            client: reqwest::Client::new(),
        })
    }

    fn listing_url(&self) -> Result<Url> {
        self.base
            .join("api/sounds")
            .map_err(|e| SoundboardError::Listing(e.to_string()))
    }

    fn clip_url(&self, id: &str) -> Option<Url> {
        let mut url = self.base.join("sounds/").ok()?;
        url.path_segments_mut().ok()?.pop_if_empty().push(id);
        Some(url)
    }
}

#[async_trait]
impl ClipCatalogProvider for RemoteListing {
    async fn list_clips(&self) -> Result<Vec<String>> {
        let url = self.listing_url()?;
        tracing::debug!("Fetching sound list from {}", url);

        let response = self.client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SoundboardError::Listing(e.to_string()))?;

        let ids: Vec<String> = response
            .json()
            .await
            .map_err(|e| SoundboardError::Listing(format!("malformed listing: {}", e)))?;

        tracing::debug!("Received {} sound files from server", ids.len());
        Ok(ids)
    }

    async fn fetch_clip(&self, id: &str) -> Result<Vec<u8>> {
        let fetch_error = |reason: String| SoundboardError::Fetch { id: id.to_string(), reason };
        let url = self.clip_url(id).ok_or_else(|| fetch_error("invalid clip url".to_string()))?;

        let response = self.client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fetch_error(e.to_string()))?;

        let bytes = response.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn describe(&self) -> String {
        format!("listing at {}", self.base)
    }
}

/// Join a single file name onto `root`, refusing anything that could
/// leave it (separators, `..`, absolute paths)
pub fn safe_join(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(root.join(relative)),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// In-memory catalog; ids without bytes fail to fetch
    pub(crate) struct MemoryCatalog {
        ids: Vec<String>,
        files: HashMap<String, Vec<u8>>,
        fail_listing: bool,
    }

    impl MemoryCatalog {
        pub(crate) fn new(entries: Vec<(&str, Option<Vec<u8>>)>) -> Self {
            let mut files = HashMap::new();
            let ids = entries
                .into_iter()
                .map(|(id, bytes)| {
                    if let Some(bytes) = bytes {
                        files.insert(id.to_string(), bytes);
                    }
                    id.to_string()
                })
                .collect();
            Self { ids, files, fail_listing: false }
        }

        pub(crate) fn failing() -> Self {
            Self { ids: Vec::new(), files: HashMap::new(), fail_listing: true }
        }
    }

    #[async_trait]
    impl ClipCatalogProvider for MemoryCatalog {
        async fn list_clips(&self) -> Result<Vec<String>> {
            if self.fail_listing {
                return Err(SoundboardError::Listing("listing unavailable".to_string()));
            }
            Ok(self.ids.clone())
        }

        async fn fetch_clip(&self, id: &str) -> Result<Vec<u8>> {
            self.files.get(id).cloned().ok_or_else(|| SoundboardError::Fetch {
                id: id.to_string(),
                reason: "not found".to_string(),
            })
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }
}
