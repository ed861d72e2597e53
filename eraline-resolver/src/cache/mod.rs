//! Two-layer attribution cache
//!
//! - `get`: ephemeral first, then durable; a durable hit backfills the ephemeral layer
//! - `put`: ephemeral synchronously, durable in a background task (failures logged)
//! - `invalidate`: ephemeral only; the durable row is overwritten by the next `put`
//!
//! Durable read failures degrade to "absent" so the caller re-resolves.

pub mod durable;
pub mod ephemeral;

pub use durable::{DurableStore, SqliteDurableStore};
pub use ephemeral::{CacheSnapshot, EphemeralCache};

use crate::error::Result;
use crate::models::AttributionEntry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Attribution store passed to the resolver at construction
pub struct AttributionStore {
    ephemeral: EphemeralCache,
    durable: Option<Arc<dyn DurableStore>>,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
    snapshot_path: Option<PathBuf>,
}

impl AttributionStore {
    pub fn new(version: u32, durable: Option<Arc<dyn DurableStore>>) -> Self {
        Self {
            ephemeral: EphemeralCache::new(version),
            durable,
            pending_writes: Mutex::new(Vec::new()),
            snapshot_path: None,
        }
    }

    /// Persist the ephemeral layer to this file on `save_snapshot`
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn ephemeral(&self) -> &EphemeralCache {
        &self.ephemeral
    }

    /// Read-through lookup
    pub async fn get(&self, subject_id: &str) -> Option<AttributionEntry> {
        if let Some(entry) = self.ephemeral.get(subject_id).await {
            return Some(entry);
        }

        let durable = self.durable.as_ref()?;
        match durable.get(subject_id).await {
            Ok(Some(entry)) => {
                debug!(subject_id, "Durable hit, backfilling ephemeral cache");
                self.ephemeral.insert(entry.clone()).await;
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(subject_id, error = %e, "Durable read failed, treating as absent");
                None
            }
        }
    }

    /// Write-through; the durable write never blocks or fails the caller
    pub async fn put(&self, entry: AttributionEntry) {
        if entry.is_pending() {
            debug!(subject_id = %entry.subject_id, "Refusing to cache a pending placeholder");
            return;
        }

        self.ephemeral.insert(entry.clone()).await;

        let Some(durable) = self.durable.clone() else {
            return;
        };
        let handle = tokio::spawn(async move {
            if let Err(e) = durable.upsert(&entry).await {
                warn!(
                    subject_id = %entry.subject_id,
                    error = %e,
                    "Durable write failed; ephemeral copy stays authoritative"
                );
            }
        });

        let mut pending = self.pending_writes.lock().await;
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Drop one subject from the ephemeral layer
    pub async fn invalidate(&self, subject_id: &str) {
        self.ephemeral.remove(subject_id).await;
    }

    /// Adopt a cache version; a mismatch forces an ephemeral cold start
    pub async fn init(&self, version: u32) -> bool {
        self.ephemeral.init(version).await
    }

    /// Drop the ephemeral layer, keeping its version
    pub async fn reset(&self) {
        self.ephemeral.reset().await;
    }

    /// Manual clear: ephemeral layer plus its snapshot file
    pub async fn clear(&self) -> Result<()> {
        self.ephemeral.reset().await;
        if let Some(path) = &self.snapshot_path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => info!(path = %path.display(), "Removed cache snapshot"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(crate::error::ResolverError::Common(e.into())),
            }
        }
        Ok(())
    }

    /// Batch-load durable entries into the ephemeral layer; returns the count loaded
    pub async fn prefetch(&self, subject_ids: &[String]) -> usize {
        let Some(durable) = self.durable.as_ref() else {
            return 0;
        };

        let mut missing = Vec::new();
        for id in subject_ids {
            if self.ephemeral.get(id).await.is_none() {
                missing.push(id.clone());
            }
        }
        if missing.is_empty() {
            return 0;
        }

        match durable.get_many(&missing).await {
            Ok(entries) => {
                let count = entries.len();
                for entry in entries {
                    self.ephemeral.insert(entry).await;
                }
                debug!(requested = missing.len(), loaded = count, "Prefetched durable entries");
                count
            }
            Err(e) => {
                warn!(error = %e, "Durable batch read failed, skipping prefetch");
                0
            }
        }
    }

    /// Wait for background durable writes issued so far
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.pending_writes.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Durable write task panicked");
            }
        }
    }

    /// Every durable entry (admin listing)
    pub async fn all_durable(&self) -> Result<Vec<AttributionEntry>> {
        match &self.durable {
            Some(durable) => durable.list_all().await,
            None => Ok(Vec::new()),
        }
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    pub async fn save_snapshot(&self) -> Result<()> {
        match &self.snapshot_path {
            Some(path) => self.ephemeral.save_to(path).await,
            None => Ok(()),
        }
    }

    /// Restore the ephemeral layer from its snapshot file if versions match
    pub async fn load_snapshot(&self) -> Result<bool> {
        match &self.snapshot_path {
            Some(path) => self.ephemeral.load_from(path).await,
            None => Ok(false),
        }
    }
}
