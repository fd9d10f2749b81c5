//! Persisted artifact cache
//!
//! Maps each artifact identity to the hash it was last built from and the
//! image that build produced. The whole map is loaded once per build and
//! written back once at the end.

use crate::error::{DockyardError, DockyardResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Last known build of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content hash the image was built from
    pub hash: String,

    /// Image digest, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Tag the image was built as (never carries `@digest`)
    pub tag: String,

    /// When the entry was recorded
    #[serde(default = "Utc::now")]
    pub built_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(hash: impl Into<String>, tag: impl Into<String>, digest: Option<String>) -> Self {
        Self {
            hash: hash.into(),
            digest,
            tag: tag.into(),
            built_at: Utc::now(),
        }
    }
}

/// In-memory view of the cache file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheStore {
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from disk
    ///
    /// A missing or unreadable file yields an empty store: losing the
    /// cache only costs rebuilds.
    pub async fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file at {}, starting empty", path.display());
                return Self::new();
            }
            Err(e) => {
                warn!(
                    "Cannot read cache file {}: {}. Starting with an empty cache",
                    path.display(),
                    e
                );
                return Self::new();
            }
        };

        if content.trim().is_empty() {
            return Self::new();
        }

        match serde_json::from_str::<CacheStore>(&content) {
            Ok(store) => {
                debug!(
                    "Loaded {} cache entries from {}",
                    store.len(),
                    path.display()
                );
                store
            }
            Err(e) => {
                warn!(
                    "Cache file {} is corrupt ({}). Starting with an empty cache",
                    path.display(),
                    e
                );
                Self::new()
            }
        }
    }

    /// Look up an artifact
    pub fn get(&self, identity: &str) -> Option<&CacheEntry> {
        self.entries.get(identity)
    }

    /// Insert or replace an artifact's entry
    pub fn put(&mut self, identity: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(identity.into(), entry);
    }

    /// Drop an artifact's entry
    pub fn remove(&mut self, identity: &str) -> Option<CacheEntry> {
        self.entries.remove(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in identity order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    /// Write the store to `path`
    ///
    /// Writes a sibling temp file and renames it into place, so a reader
    /// sees either the previous file or the new one, never a partial write.
    pub async fn flush(&self, path: &Path) -> DockyardResult<()> {
        let flush_error = |source: std::io::Error| DockyardError::CacheFlush {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(flush_error)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let temp_path = temp_path_for(path);

        fs::write(&temp_path, content).await.map_err(flush_error)?;
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(flush_error(e));
        }

        debug!("Flushed {} cache entries to {}", self.len(), path.display());
        Ok(())
    }
}

/// Sibling path the flush writes before renaming over `path`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "cache".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::load(&temp.path().join("cache.json")).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = CacheStore::load(&path).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn flush_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("cache.json");

        let mut store = CacheStore::new();
        store.put("app", CacheEntry::new("h1", "app:v1", Some("sha256:aa".to_string())));
        store.put("worker", CacheEntry::new("h2", "worker:v1", None));
        store.flush(&path).await.unwrap();

        let loaded = CacheStore::load(&path).await;
        assert_eq!(loaded, store);
        assert!(!temp_path_for(&path).exists());
    }

    #[tokio::test]
    async fn unknown_fields_ignored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{"app": {"hash": "h1", "tag": "app:v1", "digest": "sha256:aa", "builder": "kaniko"}}"#,
        )
        .unwrap();

        let store = CacheStore::load(&path).await;
        let entry = store.get("app").unwrap();
        assert_eq!(entry.hash, "h1");
        assert_eq!(entry.digest.as_deref(), Some("sha256:aa"));
    }

    #[tokio::test]
    async fn flush_replaces_previous_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");

        let mut store = CacheStore::new();
        store.put("app", CacheEntry::new("h1", "app:v1", None));
        store.flush(&path).await.unwrap();

        store.put("app", CacheEntry::new("h2", "app:v2", None));
        store.remove("missing");
        store.flush(&path).await.unwrap();

        let loaded = CacheStore::load(&path).await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("app").unwrap().hash, "h2");
    }

    #[tokio::test]
    async fn flush_into_unwritable_location_fails() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "a file, not a directory").unwrap();

        let err = CacheStore::new()
            .flush(&blocker.join("cache.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, DockyardError::CacheFlush { .. }));
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path_for(Path::new("/state/cache.json")),
            PathBuf::from("/state/cache.json.tmp")
        );
        assert_eq!(
            temp_path_for(Path::new("/state/cache.tmp")),
            PathBuf::from("/state/cache.tmp.tmp")
        );
        assert_ne!(
            temp_path_for(Path::new("cache.json")),
            temp_path_for(Path::new("cache.yaml"))
        );
    }

    #[tokio::test]
    async fn flush_to_tmp_named_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.tmp");

        let mut store = CacheStore::new();
        store.put("app", CacheEntry::new("h1", "app:v1", None));
        store.flush(&path).await.unwrap();

        assert_eq!(CacheStore::load(&path).await, store);
        assert!(!temp_path_for(&path).exists());
    }
}
