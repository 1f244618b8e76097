//! Chapter page buckets
//!
//! Each chapter owns `{prefix}-{collection}-chapter-{number}` plus a
//! `{prefix}-staging-{collection}-chapter-{number}` sibling. Downloads write
//! into staging; promotion merges staging into the chapter bucket once the
//! chapter is complete.

use bridge_traits::storage::ContentCache;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::{OfflineError, Result};
use crate::models::ChapterKey;

pub struct ChapterBuckets {
    cache: Arc<dyn ContentCache>,
    prefix: String,
}

impl ChapterBuckets {
    pub fn new(cache: Arc<dyn ContentCache>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    pub fn chapter_bucket(&self, key: &ChapterKey) -> String {
        key.bucket_name(&self.prefix)
    }

    pub fn staging_bucket(&self, key: &ChapterKey) -> String {
        key.staging_bucket_name(&self.prefix)
    }

    /// Whether `url` is already stored for this chapter, staged or promoted.
    pub async fn is_cached(&self, key: &ChapterKey, url: &str) -> Result<bool> {
        let in_chapter = self
            .cache
            .contains(&self.chapter_bucket(key), url)
            .await
            .map_err(|e| OfflineError::storage("lookup cached page", e))?;
        if in_chapter {
            return Ok(true);
        }

        self.cache
            .contains(&self.staging_bucket(key), url)
            .await
            .map_err(|e| OfflineError::storage("lookup staged page", e))
    }

    pub async fn stage(&self, key: &ChapterKey, url: &str, body: Bytes) -> Result<()> {
        self.cache
            .put(&self.staging_bucket(key), url, body)
            .await
            .map_err(|e| OfflineError::storage("stage page", e))
    }

    /// Merge staging into the chapter bucket, then drop pages that are no
    /// longer part of the chapter. Returns the number of pages promoted.
    pub async fn promote(&self, key: &ChapterKey, pages: &[String]) -> Result<usize> {
        let chapter = self.chapter_bucket(key);
        let moved = self
            .cache
            .merge_bucket(&self.staging_bucket(key), &chapter)
            .await
            .map_err(|e| OfflineError::storage("promote staged pages", e))?;

        let wanted: HashSet<&str> = pages.iter().map(String::as_str).collect();
        let stored = self
            .cache
            .keys(&chapter)
            .await
            .map_err(|e| OfflineError::storage("list chapter pages", e))?;

        let mut pruned = 0;
        for url in stored.iter().filter(|url| !wanted.contains(url.as_str())) {
            self.cache
                .delete(&chapter, url)
                .await
                .map_err(|e| OfflineError::storage("prune stale page", e))?;
            pruned += 1;
        }

        debug!(chapter = %key, moved, pruned, "Promoted staged pages");
        Ok(moved)
    }

    pub async fn discard_staging(&self, key: &ChapterKey) -> Result<bool> {
        self.cache
            .delete_bucket(&self.staging_bucket(key))
            .await
            .map_err(|e| OfflineError::storage("discard staged pages", e))
    }

    /// Delete the promoted pages only, leaving staged pages in place.
    pub async fn remove_chapter(&self, key: &ChapterKey) -> Result<bool> {
        self.cache
            .delete_bucket(&self.chapter_bucket(key))
            .await
            .map_err(|e| OfflineError::storage("delete chapter bucket", e))
    }

    /// Delete the chapter bucket and its staging bucket.
    ///
    /// Both deletions are attempted; the first error is returned.
    pub async fn remove(&self, key: &ChapterKey) -> Result<bool> {
        let chapter = self.remove_chapter(key).await;
        let staging = self.discard_staging(key).await;

        Ok(chapter? | staging?)
    }

    /// Delete every chapter bucket under this prefix, staged or promoted.
    ///
    /// Other buckets sharing the prefix, such as `manga-covers`, are kept.
    pub async fn remove_all(&self) -> Result<usize> {
        let buckets = self
            .cache
            .list_buckets()
            .await
            .map_err(|e| OfflineError::storage("list buckets", e))?;

        let mut removed = 0;
        for bucket in buckets.iter().filter(|b| is_chapter_bucket(b, &self.prefix)) {
            if self
                .cache
                .delete_bucket(bucket)
                .await
                .map_err(|e| OfflineError::storage("delete bucket", e))?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Chapter bucket exists and holds at least one page.
    pub async fn has_content(&self, key: &ChapterKey) -> Result<bool> {
        let keys = self
            .cache
            .keys(&self.chapter_bucket(key))
            .await
            .map_err(|e| OfflineError::storage("list chapter pages", e))?;
        Ok(!keys.is_empty())
    }

    pub async fn staged_pages(&self, key: &ChapterKey) -> Result<Vec<String>> {
        self.cache
            .keys(&self.staging_bucket(key))
            .await
            .map_err(|e| OfflineError::storage("list staged pages", e))
    }

    pub async fn read(&self, key: &ChapterKey, url: &str) -> Result<Option<Bytes>> {
        self.cache
            .get(&self.chapter_bucket(key), url)
            .await
            .map_err(|e| OfflineError::storage("read cached page", e))
    }
}

/// Matches `{prefix}-[staging-]{id}-chapter-{number}`.
fn is_chapter_bucket(bucket: &str, prefix: &str) -> bool {
    let Some(rest) = bucket
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
    else {
        return false;
    };
    let rest = rest.strip_prefix("staging-").unwrap_or(rest);
    let Some((id, _number)) = rest.split_once("-chapter-") else {
        return false;
    };
    let digits = id.strip_prefix('-').unwrap_or(id);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::MemoryContentCache;

    fn buckets() -> (Arc<MemoryContentCache>, ChapterBuckets) {
        let cache = Arc::new(MemoryContentCache::new());
        let buckets = ChapterBuckets::new(cache.clone(), "manga");
        (cache, buckets)
    }

    #[tokio::test]
    async fn test_stage_then_promote() {
        let (cache, buckets) = buckets();
        let key = ChapterKey::new(4, "2");

        buckets.stage(&key, "u1", Bytes::from_static(b"1")).await.unwrap();
        assert!(buckets.is_cached(&key, "u1").await.unwrap());
        assert!(!buckets.has_content(&key).await.unwrap());
        assert_eq!(buckets.staged_pages(&key).await.unwrap(), vec!["u1"]);

        let pages = vec!["u1".to_string()];
        assert_eq!(buckets.promote(&key, &pages).await.unwrap(), 1);

        assert!(buckets.has_content(&key).await.unwrap());
        assert!(!cache.has_bucket("manga-staging-4-chapter-2").await.unwrap());
        assert!(buckets.staged_pages(&key).await.unwrap().is_empty());
        assert_eq!(
            buckets.read(&key, "u1").await.unwrap(),
            Some(Bytes::from_static(b"1"))
        );
    }

    #[tokio::test]
    async fn test_promote_prunes_stale_pages() {
        let (cache, buckets) = buckets();
        let key = ChapterKey::new(4, "2");

        cache
            .put("manga-4-chapter-2", "old", Bytes::from_static(b"x"))
            .await
            .unwrap();
        cache
            .put("manga-4-chapter-2", "kept", Bytes::from_static(b"k"))
            .await
            .unwrap();
        buckets.stage(&key, "new", Bytes::from_static(b"n")).await.unwrap();

        let pages = vec!["kept".to_string(), "new".to_string()];
        buckets.promote(&key, &pages).await.unwrap();

        assert_eq!(
            cache.keys("manga-4-chapter-2").await.unwrap(),
            vec!["kept", "new"]
        );
    }

    #[tokio::test]
    async fn test_remove_deletes_both_buckets() {
        let (cache, buckets) = buckets();
        let key = ChapterKey::new(9, "1");

        cache
            .put("manga-9-chapter-1", "a", Bytes::from_static(b"a"))
            .await
            .unwrap();
        buckets.stage(&key, "b", Bytes::from_static(b"b")).await.unwrap();

        assert!(buckets.remove(&key).await.unwrap());
        assert!(cache.list_buckets().await.unwrap().is_empty());
        assert!(!buckets.remove(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_chapter_keeps_staged_pages() {
        let (cache, buckets) = buckets();
        let key = ChapterKey::new(9, "1");

        cache
            .put("manga-9-chapter-1", "a", Bytes::from_static(b"a"))
            .await
            .unwrap();
        buckets.stage(&key, "b", Bytes::from_static(b"b")).await.unwrap();

        assert!(buckets.remove_chapter(&key).await.unwrap());
        assert!(!buckets.has_content(&key).await.unwrap());
        assert_eq!(buckets.staged_pages(&key).await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_remove_all_keeps_foreign_buckets() {
        let (cache, buckets) = buckets();

        cache
            .put("manga-1-chapter-1", "a", Bytes::from_static(b"a"))
            .await
            .unwrap();
        cache
            .put("manga-staging-2-chapter-5", "b", Bytes::from_static(b"b"))
            .await
            .unwrap();
        cache
            .put("manga--3-chapter-1", "d", Bytes::from_static(b"d"))
            .await
            .unwrap();
        for foreign in ["covers", "manga-covers", "manga-x1-chapter-1", "mangas-1-chapter-1"] {
            cache
                .put(foreign, "c", Bytes::from_static(b"c"))
                .await
                .unwrap();
        }

        assert_eq!(buckets.remove_all().await.unwrap(), 3);
        assert_eq!(
            cache.list_buckets().await.unwrap(),
            vec!["covers", "manga-covers", "manga-x1-chapter-1", "mangas-1-chapter-1"]
        );
    }

    #[test]
    fn test_chapter_bucket_matching() {
        assert!(is_chapter_bucket("manga-42-chapter-7.5", "manga"));
        assert!(is_chapter_bucket("manga-staging-42-chapter-7", "manga"));
        assert!(is_chapter_bucket("manga--1-chapter-2", "manga"));
        assert!(!is_chapter_bucket("manga-covers", "manga"));
        assert!(!is_chapter_bucket("manga-staging-covers", "manga"));
        assert!(!is_chapter_bucket("manga--chapter-1", "manga"));
        assert!(!is_chapter_bucket("manhwa-1-chapter-1", "manga"));
    }
}
