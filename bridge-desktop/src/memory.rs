//! In-memory stores for tests and ephemeral sessions

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    storage::{ContentCache, SettingsStore},
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// `HashMap`-backed record store
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<_> = self.values.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear_all(&self) -> Result<()> {
        self.values.lock().clear();
        Ok(())
    }
}

/// Bucket map held entirely in memory
#[derive(Default)]
pub struct MemoryContentCache {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Bytes>>>,
}

impl MemoryContentCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentCache for MemoryContentCache {
    async fn has_bucket(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets.lock().contains_key(bucket))
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets.lock().remove(bucket).is_some())
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        Ok(self.buckets.lock().keys().cloned().collect())
    }

    async fn contains(&self, bucket: &str, url: &str) -> Result<bool> {
        Ok(self
            .buckets
            .lock()
            .get(bucket)
            .is_some_and(|entries| entries.contains_key(url)))
    }

    async fn get(&self, bucket: &str, url: &str) -> Result<Option<Bytes>> {
        Ok(self
            .buckets
            .lock()
            .get(bucket)
            .and_then(|entries| entries.get(url).cloned()))
    }

    async fn put(&self, bucket: &str, url: &str, body: Bytes) -> Result<()> {
        self.buckets
            .lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(url.to_string(), body);
        Ok(())
    }

    async fn delete(&self, bucket: &str, url: &str) -> Result<bool> {
        Ok(self
            .buckets
            .lock()
            .get_mut(bucket)
            .is_some_and(|entries| entries.remove(url).is_some()))
    }

    async fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        Ok(self
            .buckets
            .lock()
            .get(bucket)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn merge_bucket(&self, from: &str, into: &str) -> Result<usize> {
        let mut buckets = self.buckets.lock();
        let Some(staged) = buckets.remove(from) else {
            return Ok(0);
        };
        let moved = staged.len();
        buckets.entry(into.to_string()).or_default().extend(staged);
        Ok(moved)
    }
}
