//! Ephemeral (in-process) attribution cache
//!
//! Tagged with a version. `init(version)` with a different version drops every
//! entry; the durable store is never touched from here. The cache can be
//! snapshotted to a JSON file and restored on the next start.

use crate::error::{ResolverError, Result};
use crate::models::AttributionEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// On-disk form of the ephemeral cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: u32,
    pub entries: Vec<AttributionEntry>,
}

#[derive(Debug)]
struct CacheState {
    version: u32,
    entries: HashMap<String, AttributionEntry>,
}

#[derive(Debug)]
pub struct EphemeralCache {
    state: RwLock<CacheState>,
}

impl EphemeralCache {
    pub fn new(version: u32) -> Self {
        Self {
            state: RwLock::new(CacheState {
                version,
                entries: HashMap::new(),
            }),
        }
    }

    /// Adopt `version`; on mismatch every entry is dropped (cold start)
    ///
    /// Returns true when entries were dropped.
    pub async fn init(&self, version: u32) -> bool {
        let mut state = self.state.write().await;
        if state.version == version {
            return false;
        }
        info!(
            old_version = state.version,
            new_version = version,
            dropped = state.entries.len(),
            "Ephemeral cache version changed, dropping entries"
        );
        state.version = version;
        state.entries.clear();
        true
    }

    /// Drop every entry, keeping the version
    pub async fn reset(&self) {
        self.state.write().await.entries.clear();
    }

    pub async fn version(&self) -> u32 {
        self.state.read().await.version
    }

    pub async fn get(&self, subject_id: &str) -> Option<AttributionEntry> {
        self.state.read().await.entries.get(subject_id).cloned()
    }

    pub async fn insert(&self, entry: AttributionEntry) {
        self.state
            .write()
            .await
            .entries
            .insert(entry.subject_id.clone(), entry);
    }

    pub async fn remove(&self, subject_id: &str) -> Option<AttributionEntry> {
        self.state.write().await.entries.remove(subject_id)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let state = self.state.read().await;
        let mut entries: Vec<AttributionEntry> = state.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
        CacheSnapshot {
            version: state.version,
            entries,
        }
    }

    /// Load a snapshot; ignored (returns false) when its version differs
    pub async fn restore(&self, snapshot: CacheSnapshot) -> bool {
        let mut state = self.state.write().await;
        if snapshot.version != state.version {
            info!(
                snapshot_version = snapshot.version,
                running_version = state.version,
                "Discarding ephemeral cache snapshot with stale version"
            );
            return false;
        }
        for entry in snapshot.entries {
            state.entries.insert(entry.subject_id.clone(), entry);
        }
        true
    }

    /// Write the snapshot atomically (temp file + rename)
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot().await;
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| ResolverError::Common(e.into()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ResolverError::Common(e.into()))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| ResolverError::Common(e.into()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| ResolverError::Common(e.into()))?;

        debug!(path = %path.display(), entries = snapshot.entries.len(), "Saved cache snapshot");
        Ok(())
    }

    /// Restore from a snapshot file; a missing file is not an error
    pub async fn load_from(&self, path: &Path) -> Result<bool> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(ResolverError::Common(e.into())),
        };
        let snapshot: CacheSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| ResolverError::Common(e.into()))?;
        Ok(self.restore(snapshot).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributionSource, Period, Reliability, SubjectMetadata};
    use tempfile::TempDir;

    fn entry(id: &str, year: i32) -> AttributionEntry {
        AttributionEntry::from_period(
            &SubjectMetadata::new(id, format!("Subject {}", id)),
            Period::years(year, None, vec![]),
            Reliability::High,
            AttributionSource::Pattern,
            None,
        )
    }

    #[tokio::test]
    async fn test_version_change_drops_entries() {
        let cache = EphemeralCache::new(13);
        cache.insert(entry("1", 1944)).await;

        assert!(!cache.init(13).await);
        assert_eq!(cache.len().await, 1);

        assert!(cache.init(14).await);
        assert!(cache.is_empty().await);
        assert_eq!(cache.version().await, 14);
    }

    #[tokio::test]
    async fn test_snapshot_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");

        let cache = EphemeralCache::new(13);
        cache.insert(entry("1", 1944)).await;
        cache.insert(entry("2", 1863)).await;
        cache.save_to(&path).await.unwrap();

        let fresh = EphemeralCache::new(13);
        assert!(fresh.load_from(&path).await.unwrap());
        assert_eq!(fresh.get("2").await, cache.get("2").await);
        assert_eq!(fresh.len().await, 2);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");

        let old = EphemeralCache::new(12);
        old.insert(entry("1", 1944)).await;
        old.save_to(&path).await.unwrap();

        let cache = EphemeralCache::new(13);
        assert!(!cache.load_from(&path).await.unwrap());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_snapshot_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = EphemeralCache::new(13);
        assert!(!cache
            .load_from(&temp_dir.path().join("absent.json"))
            .await
            .unwrap());
    }
}
