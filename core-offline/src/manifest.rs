//! Offline library manifest
//!
//! The whole manifest is one JSON array in a single settings slot. Every
//! change is a read-modify-write of that slot, serialized through an async
//! lock so two chapters finishing together cannot drop each other's entry.

use bridge_traits::storage::SettingsStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{OfflineError, Result};
use crate::models::{ChapterKey, ChapterManifestEntry};

pub struct ManifestStore {
    store: Arc<dyn SettingsStore>,
    key: String,
    write_lock: Mutex<()>,
}

impl ManifestStore {
    pub fn new(store: Arc<dyn SettingsStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// All entries; an absent or blank slot is an empty manifest.
    pub async fn load(&self) -> Result<Vec<ChapterManifestEntry>> {
        let raw = self
            .store
            .get_string(&self.key)
            .await
            .map_err(|e| OfflineError::storage("read manifest", e))?;

        match raw {
            Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(&json)?),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn get(&self, key: &ChapterKey) -> Result<Option<ChapterManifestEntry>> {
        Ok(self.load().await?.into_iter().find(|e| e.key() == *key))
    }

    /// Replace any entry for the same chapter and append `entry`.
    pub async fn upsert(&self, entry: ChapterManifestEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let key = entry.key();
        let mut entries = self.load().await?;
        entries.retain(|e| e.key() != key);
        entries.push(entry);

        self.write(&entries).await?;
        debug!(chapter = %key, total = entries.len(), "Manifest entry saved");
        Ok(())
    }

    /// Remove the chapter's entry. Returns whether one existed.
    pub async fn remove(&self, key: &ChapterKey) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|e| e.key() != *key);
        let removed = entries.len() != before;

        // Filter-and-rewrite even when nothing matched
        self.write(&entries).await?;
        Ok(removed)
    }

    /// Overwrite the manifest with `entries`.
    pub async fn replace_all(&self, entries: &[ChapterManifestEntry]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(entries).await
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store
            .delete(&self.key)
            .await
            .map_err(|e| OfflineError::storage("clear manifest", e))
    }

    async fn write(&self, entries: &[ChapterManifestEntry]) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        self.store.set_string(&self.key, &json).await.map_err(|e| {
            warn!(error = %e, "Failed to write manifest");
            OfflineError::storage("write manifest", e)
        })
    }
}
