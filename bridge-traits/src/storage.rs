//! Storage Abstractions
//!
//! Two persistence surfaces back the offline library:
//! - [`SettingsStore`]: durable string-keyed slots (the manifest lives in one)
//! - [`ContentCache`]: named buckets of binary bodies keyed by request URL

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Key-value record storage trait
///
/// Abstracts host-specific durable storage:
/// - Desktop: SQLite-backed table
/// - Embedded webview: `localStorage`
/// - Tests: in-memory map
///
/// Writes replace the whole value; there is no partial update primitive.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_library(store: &dyn SettingsStore, json: &str) -> Result<()> {
///     store.set_string("offline_library", json).await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value, replacing any previous value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value, `None` if the key is absent
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a value. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all values
    async fn clear_all(&self) -> Result<()>;
}

/// Binary content cache trait
///
/// Mirrors the browser Cache Storage model: named buckets, each a set of
/// request URL → response body pairs.
///
/// - Desktop: one directory per bucket, one file per URL
/// - Embedded webview: `window.caches`
/// - Tests: in-memory maps
///
/// Opening a bucket is implicit: `put` creates it when missing.
#[async_trait]
pub trait ContentCache: Send + Sync {
    /// Whether a bucket with this name exists
    async fn has_bucket(&self, bucket: &str) -> Result<bool>;

    /// Delete a bucket and everything in it. Returns `false` if it did not exist.
    async fn delete_bucket(&self, bucket: &str) -> Result<bool>;

    /// Names of all buckets
    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// Whether `url` is stored in `bucket`
    async fn contains(&self, bucket: &str, url: &str) -> Result<bool>;

    /// Stored body for `url`, `None` if missing
    async fn get(&self, bucket: &str, url: &str) -> Result<Option<Bytes>>;

    /// Store `body` under `url`, creating the bucket if needed
    async fn put(&self, bucket: &str, url: &str, body: Bytes) -> Result<()>;

    /// Remove one entry. Returns `false` if it was not present.
    async fn delete(&self, bucket: &str, url: &str) -> Result<bool>;

    /// URLs stored in `bucket`; empty if the bucket does not exist
    async fn keys(&self, bucket: &str) -> Result<Vec<String>>;

    /// Move every entry of `from` into `into` (overwriting) and delete `from`.
    ///
    /// Returns the number of entries moved.
    async fn merge_bucket(&self, from: &str, into: &str) -> Result<usize> {
        let keys = self.keys(from).await?;
        let mut moved = 0;
        for url in &keys {
            if let Some(body) = self.get(from, url).await? {
                self.put(into, url, body).await?;
                moved += 1;
            }
        }
        self.delete_bucket(from).await?;
        Ok(moved)
    }
}
