//! Content-hash keyed asset cache
//!
//! Layout under the cache root:
//!
//! ```text
//! <hash>/source.<ext>      fetched audio
//! <hash>/stems/vocals.wav  separated vocals, when stems were generated
//! <hash>/analysis.json     cached analysis result
//! <hash>/lrc.json          cached synced-lyrics result
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::AssetFetcher;
use crate::error::WorkerResult;
use crate::models::validate_content_hash;

pub const ANALYSIS_ENTRY: &str = "analysis.json";
pub const LRC_ENTRY: &str = "lrc.json";

const SOURCE_STEM: &str = "source";
const STEMS_DIR: &str = "stems";
const VOCALS_FILE: &str = "vocals.wav";

/// Unique sibling of `path` to stage a write before renaming it into place.
/// The leading dot keeps it from ever matching a cache entry name.
pub(crate) fn scratch_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("entry");
    path.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4().simple()))
}

/// Clones share the per-hash fetch locks, so every executor holding a clone
/// downloads a given source at most once at a time.
#[derive(Debug, Clone)]
pub struct AssetCache {
    root: PathBuf,
    fetch_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fetch_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one content hash; the hash is checked before it becomes a path
    pub fn entry_dir(&self, hash: &str) -> WorkerResult<PathBuf> {
        validate_content_hash(hash)?;
        Ok(self.root.join(hash))
    }

    pub fn stems_dir(&self, hash: &str) -> WorkerResult<PathBuf> {
        Ok(self.entry_dir(hash)?.join(STEMS_DIR))
    }

    /// Cached vocals stem, if one exists
    pub async fn vocals_stem(&self, hash: &str) -> WorkerResult<Option<PathBuf>> {
        let path = self.stems_dir(hash)?.join(VOCALS_FILE);
        Ok(tokio::fs::try_exists(&path)
            .await
            .unwrap_or(false)
            .then_some(path))
    }

    /// Previously fetched source audio, if any
    pub async fn cached_source(&self, hash: &str) -> WorkerResult<Option<PathBuf>> {
        let dir = self.entry_dir(hash)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_source = path.file_stem().and_then(|s| s.to_str()) == Some(SOURCE_STEM)
                && path.extension().and_then(|e| e.to_str()) != Some("part");
            if is_source && entry.file_type().await?.is_file() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Local copy of the source audio, fetching it on a miss
    pub async fn fetch_source(
        &self,
        fetcher: &dyn AssetFetcher,
        audio_url: &str,
        hash: &str,
    ) -> WorkerResult<PathBuf> {
        if let Some(path) = self.cached_source(hash).await? {
            debug!(hash, path = %path.display(), "Source audio cache hit");
            return Ok(path);
        }

        let lock = self.fetch_locks.entry(hash.to_string()).or_default().clone();
        let _guard = lock.lock().await;

        // Whoever held the lock before us may have fetched it already
        if let Some(path) = self.cached_source(hash).await? {
            debug!(hash, path = %path.display(), "Source audio fetched concurrently");
            return Ok(path);
        }

        let dest = self
            .entry_dir(hash)?
            .join(format!("{}.{}", SOURCE_STEM, source_extension(audio_url)));
        fetcher.fetch(audio_url, &dest).await?;
        Ok(dest)
    }

    /// Read a cached JSON entry. Missing entries are `None`; unreadable ones
    /// are logged and treated as missing.
    pub async fn load_json<T: DeserializeOwned>(
        &self,
        hash: &str,
        name: &str,
    ) -> WorkerResult<Option<T>> {
        let path = self.entry_dir(hash)?.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }

    /// Write a JSON entry through a temporary file so readers never see half of it
    pub async fn store_json<T: Serialize + ?Sized>(
        &self,
        hash: &str,
        name: &str,
        value: &T,
    ) -> WorkerResult<()> {
        let dir = self.entry_dir(hash)?;
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(name);
        let tmp = scratch_path(&path);
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(value)?).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// File extension for fetched audio, taken from the URL path
fn source_extension(audio_url: &str) -> String {
    let path = url::Url::parse(audio_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| audio_url.to_string());

    Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "audio".to_string())
}
