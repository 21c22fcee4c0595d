use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::fs;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{AppError, AppResult};

const PAYLOAD_EXT: &str = "bin";
const META_EXT: &str = "json";

/// Cached payload plus the validator received with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub payload: Vec<u8>,
    pub etag: String,
}

/// Metadata stored next to each payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub url: String,
    pub etag: String,
    pub size: u64,
    pub cached_at: i64,
}

/// On-disk byte cache keyed by fetch location.
///
/// Callers take [`CacheRepository::lock`] for a location before a
/// read-validate-use or download-store sequence; different locations never
/// wait on each other.
pub struct CacheRepository {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CacheRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Initialize the cache directory
    pub async fn init(&self) -> AppResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Io(format!("Failed to create cache directory: {}", e)))
    }

    /// Serialize access to one location.
    pub async fn lock(&self, url: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Forget slots nobody is holding or waiting on
            locks.retain(|_, slot| Arc::strong_count(slot) > 1);
            locks
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Look up the entry for `url`. A missing or half-written entry is a miss.
    pub async fn get(&self, url: &str) -> AppResult<Option<CacheEntry>> {
        let Some(meta) = self.read_metadata(url).await else {
            return Ok(None);
        };
        if meta.url != url {
            debug!("Cache key collision for {}, ignoring entry", url);
            return Ok(None);
        }

        match fs::read(self.payload_path(url)).await {
            Ok(payload) if payload.len() as u64 == meta.size => Ok(Some(CacheEntry {
                payload,
                etag: meta.etag,
            })),
            Ok(_) => {
                debug!("Cached payload for {} is truncated", url);
                Ok(None)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(format!("Failed to read cache file: {}", e))),
        }
    }

    /// Store `payload` for `url`, replacing any previous entry.
    pub async fn put(&self, url: &str, payload: &[u8], etag: &str) -> AppResult<()> {
        self.init().await?;

        fs::write(self.payload_path(url), payload)
            .await
            .map_err(|e| AppError::Io(format!("Failed to write cache file: {}", e)))?;

        let meta = CacheMetadata {
            url: url.to_string(),
            etag: etag.to_string(),
            size: payload.len() as u64,
            cached_at: chrono::Utc::now().timestamp(),
        };
        let content = serde_json::to_string_pretty(&meta)
            .map_err(|e| AppError::Io(format!("Failed to serialize cache metadata: {}", e)))?;
        fs::write(self.meta_path(url), content)
            .await
            .map_err(|e| AppError::Io(format!("Failed to write cache metadata: {}", e)))?;

        debug!("Cached {} bytes for {} (etag {})", payload.len(), url, etag);
        Ok(())
    }

    /// Delete the entry for `url`
    pub async fn remove(&self, url: &str) -> AppResult<()> {
        fs::remove_file(self.meta_path(url)).await.ok();
        fs::remove_file(self.payload_path(url)).await.ok();
        Ok(())
    }

    /// Metadata of every readable entry
    pub async fn entries(&self) -> AppResult<Vec<CacheMetadata>> {
        let mut result = Vec::new();
        for path in self.files_with_ext(META_EXT).await? {
            if let Ok(content) = fs::read_to_string(&path).await {
                if let Ok(meta) = serde_json::from_str::<CacheMetadata>(&content) {
                    result.push(meta);
                }
            }
        }
        Ok(result)
    }

    /// Total size of cached payloads in bytes
    pub async fn size(&self) -> AppResult<u64> {
        let mut size = 0u64;
        for path in self.files_with_ext(PAYLOAD_EXT).await? {
            if let Ok(metadata) = fs::metadata(&path).await {
                size += metadata.len();
            }
        }
        Ok(size)
    }

    /// Remove entries older than `max_age_days`, returning how many were removed
    pub async fn cleanup(&self, max_age_days: u32) -> AppResult<u64> {
        let now = chrono::Utc::now().timestamp();
        let max_age_seconds = (max_age_days as i64) * 24 * 60 * 60;
        let mut cleaned = 0u64;

        for meta in self.entries().await? {
            if now - meta.cached_at <= max_age_seconds {
                continue;
            }
            let _guard = self.lock(&meta.url).await;
            // The entry may have been stored again while we waited
            let still_stale = self
                .read_metadata(&meta.url)
                .await
                .is_some_and(|current| now - current.cached_at > max_age_seconds);
            if still_stale {
                self.remove(&meta.url).await?;
                cleaned += 1;
            }
        }

        Ok(cleaned)
    }

    /// Remove every entry
    pub async fn clear(&self) -> AppResult<()> {
        if fs::metadata(&self.root).await.is_err() {
            return Ok(());
        }
        fs::remove_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Io(format!("Failed to clear cache: {}", e)))?;
        self.init().await
    }

    fn key(url: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn payload_path(&self, url: &str) -> PathBuf {
        self.root.join(format!("{}.{}", Self::key(url), PAYLOAD_EXT))
    }

    fn meta_path(&self, url: &str) -> PathBuf {
        self.root.join(format!("{}.{}", Self::key(url), META_EXT))
    }

    async fn read_metadata(&self, url: &str) -> Option<CacheMetadata> {
        let content = fs::read_to_string(self.meta_path(url)).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    async fn files_with_ext(&self, ext: &str) -> AppResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(AppError::Io(format!("Failed to read cache directory: {}", e))),
        };

        while let Some(entry) = dir.next_entry().await.ok().flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ext) {
                files.push(path);
            }
        }
        Ok(files)
    }
}
