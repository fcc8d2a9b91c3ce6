//! Persistent metadata cache.
//!
//! Probed media information and speech durations keyed by source path or
//! speech content hash. Loaded once at startup, persisted after every
//! successful probe and cleared explicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use epi_models::MediaInfo;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};

/// Default cache file location.
pub const DEFAULT_CACHE_PATH: &str = "./cache/metaCache.json";

/// A cached probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedValue {
    Media { info: MediaInfo },
    Speech { secs: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub cached_at: DateTime<Utc>,
}

/// Cache key for a media source.
pub fn media_key(source: &str) -> String {
    format!("media:{}", source)
}

/// Cache key for a speech script content hash.
pub fn speech_key(content_hash: &str) -> String {
    format!("speech:{}", content_hash)
}

/// Metadata cache backed by a JSON file.
#[derive(Debug, Default)]
pub struct MetadataCache {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, CacheEntry>>,
    /// Held from snapshot to rename so concurrent writers never share the temp file.
    write_lock: Mutex<()>,
}

impl MetadataCache {
    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file. A missing or unreadable file starts empty.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, CacheEntry>>(&bytes) {
                Ok(entries) => {
                    info!(path = %path.display(), entries = entries.len(), "Restored metadata cache");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt metadata cache, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read metadata cache, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn get(&self, key: &str) -> Option<CachedValue> {
        self.entries.read().await.get(key).map(|e| e.value.clone())
    }

    pub async fn media(&self, source: &str) -> Option<MediaInfo> {
        match self.get(&media_key(source)).await? {
            CachedValue::Media { info } => Some(info),
            CachedValue::Speech { .. } => None,
        }
    }

    pub async fn speech(&self, content_hash: &str) -> Option<f64> {
        match self.get(&speech_key(content_hash)).await? {
            CachedValue::Speech { secs } => Some(secs),
            CachedValue::Media { .. } => None,
        }
    }

    pub async fn insert(&self, key: impl Into<String>, value: CachedValue) {
        let entry = CacheEntry {
            value,
            cached_at: Utc::now(),
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    /// Write the cache file. A no-op for in-memory caches.
    pub async fn persist(&self) -> MediaResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let json = {
            let entries = self.entries.read().await;
            serde_json::to_vec_pretty(&*entries)?
        };
        write_atomic(path, &json).await
    }

    /// Drop every entry and rewrite the file as an empty map.
    pub async fn clear(&self) -> MediaResult<()> {
        let _guard = self.write_lock.lock().await;
        self.entries.write().await.clear();
        if let Some(path) = &self.path {
            write_atomic(path, b"{}").await?;
            info!(path = %path.display(), "Cleared metadata cache");
        }
        Ok(())
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> MediaResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| MediaError::cache(format!("invalid cache path {}", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> MediaInfo {
        MediaInfo {
            duration_secs: 12.5,
            width: 1920,
            height: 1080,
            fps: 24.0,
            codec: "h264".to_string(),
            can_fast_seek: true,
        }
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("metaCache.json");

        let cache = MetadataCache::load(&path).await;
        assert!(cache.is_empty().await);
        cache
            .insert(media_key("a.mp4"), CachedValue::Media { info: info() })
            .await;
        cache
            .insert(speech_key("abc"), CachedValue::Speech { secs: 2.5 })
            .await;
        cache.persist().await.unwrap();

        let reloaded = MetadataCache::load(&path).await;
        assert_eq!(reloaded.len().await, 2);
        assert_eq!(reloaded.media("a.mp4").await, Some(info()));
        assert_eq!(reloaded.speech("abc").await, Some(2.5));
        assert_eq!(reloaded.speech("a.mp4").await, None);
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metaCache.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let cache = MetadataCache::load(&path).await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metaCache.json");

        let cache = MetadataCache::load(&path).await;
        cache
            .insert(speech_key("abc"), CachedValue::Speech { secs: 1.0 })
            .await;
        cache.persist().await.unwrap();
        cache.clear().await.unwrap();

        assert!(cache.is_empty().await);
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "{}");
        assert!(MetadataCache::load(&path).await.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_persists_keep_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metaCache.json");
        let cache = std::sync::Arc::new(MetadataCache::load(&path).await);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let key = speech_key(&format!("hash-{}", i));
                    cache.insert(key, CachedValue::Speech { secs: i as f64 }).await;
                    cache.persist().await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reloaded = MetadataCache::load(&path).await;
        assert_eq!(reloaded.len().await, 16);
        assert_eq!(reloaded.speech("hash-7").await, Some(7.0));
        assert!(!dir.path().join("metaCache.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_in_memory_persist_is_noop() {
        let cache = MetadataCache::in_memory();
        cache
            .insert(speech_key("abc"), CachedValue::Speech { secs: 1.0 })
            .await;
        cache.persist().await.unwrap();
        assert!(cache.path().is_none());
    }
}
