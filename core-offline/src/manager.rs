//! # Offline Chapter Manager
//!
//! Starts, cancels and deletes chapter downloads and answers status queries.
//!
//! ## Download flow
//!
//! 1. `Fetching`: list the chapter's pages through the [`PageSource`]
//! 2. `Downloading`: fetch each page not yet cached into the staging bucket,
//!    publishing progress after every page
//! 3. Commit: promote staging into the chapter bucket, write the manifest
//!    entry, publish `Saved`
//!
//! Steps 1 and 2 run under the download deadline and the chapter's
//! cancellation token. The commit step runs to completion once started.
//!
//! Only one download per chapter runs at a time; concurrent callers for the
//! same chapter await the running download and receive its final state.
//!
//! ## Example
//!
//! ```ignore
//! let manager = OfflineChapterManager::new(config, source, http, settings, cache)?;
//! manager.initialize().await?;
//!
//! let state = manager.start_download(42, 901, "7", Some("The Gate")).await;
//! assert!(state.is_saved());
//! ```

use bridge_traits::{
    http::{HttpClient, HttpRequest},
    source::{order_pages, PageSource},
    storage::{ContentCache, SettingsStore},
    time::{Clock, SystemClock},
};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::bucket::ChapterBuckets;
use crate::config::{OfflineConfig, PartialDownloadPolicy};
use crate::error::{OfflineError, Result};
use crate::manifest::ManifestStore;
use crate::models::{
    progress_percent, ChapterKey, ChapterManifestEntry, DownloadFailure, DownloadState,
};
use crate::status::{DownloadStatusStore, StatusStream};

type SharedDownload = Shared<BoxFuture<'static, DownloadState>>;

/// A running download
struct InFlight {
    id: u64,
    download: SharedDownload,
    cancellation_token: CancellationToken,
}

type InFlightMap = Arc<Mutex<HashMap<ChapterKey, InFlight>>>;

/// Removes the in-flight entry when the download task ends, including on
/// panic. A newer download for the same chapter is left alone.
struct InFlightGuard {
    inflight: InFlightMap,
    key: ChapterKey,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        if inflight.get(&self.key).is_some_and(|f| f.id == self.id) {
            inflight.remove(&self.key);
        }
    }
}

/// Offline chapter cache manager
pub struct OfflineChapterManager {
    /// Configuration
    config: OfflineConfig,

    /// Backend page lookup
    source: Arc<dyn PageSource>,

    /// Page image transport
    http: Arc<dyn HttpClient>,

    /// Chapter and staging buckets
    buckets: Arc<ChapterBuckets>,

    /// Durable list of saved chapters
    manifest: Arc<ManifestStore>,

    /// Shared per-chapter state
    status: Arc<DownloadStatusStore>,

    /// Stamps `saved_at`
    clock: Arc<dyn Clock>,

    /// Running downloads by chapter
    inflight: InFlightMap,

    next_download_id: Arc<AtomicU64>,
}

impl OfflineChapterManager {
    pub fn new(
        config: OfflineConfig,
        source: Arc<dyn PageSource>,
        http: Arc<dyn HttpClient>,
        settings: Arc<dyn SettingsStore>,
        cache: Arc<dyn ContentCache>,
    ) -> Result<Self> {
        config.validate()?;

        let buckets = ChapterBuckets::new(cache, config.bucket_prefix.clone());
        let manifest = ManifestStore::new(settings, config.manifest_key.clone());
        let status = DownloadStatusStore::new(config.status_channel_capacity);

        Ok(Self {
            config,
            source,
            http,
            buckets: Arc::new(buckets),
            manifest: Arc::new(manifest),
            status: Arc::new(status),
            clock: Arc::new(SystemClock),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_download_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    /// Seed `Saved` for every chapter in the manifest.
    ///
    /// With `verify_on_startup`, entries whose chapter bucket is missing or
    /// empty are dropped from the manifest first. Returns the number of
    /// chapters seeded.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<usize> {
        let mut entries = self.manifest.load().await?;

        if self.config.verify_on_startup {
            entries = self.reconcile(entries).await?;
        }

        for entry in &entries {
            self.status.set(&entry.key(), DownloadState::saved());
        }

        info!(count = entries.len(), "Restored offline library");
        Ok(entries.len())
    }

    async fn reconcile(
        &self,
        entries: Vec<ChapterManifestEntry>,
    ) -> Result<Vec<ChapterManifestEntry>> {
        let mut kept = Vec::with_capacity(entries.len());
        let mut dropped = 0;

        for entry in entries {
            let key = entry.key();
            match self.buckets.has_content(&key).await {
                Ok(true) => kept.push(entry),
                Ok(false) => {
                    warn!(chapter = %key, "Dropping manifest entry with no cached pages");
                    dropped += 1;
                }
                Err(e) => {
                    warn!(chapter = %key, error = %e, "Could not verify cached pages, keeping entry");
                    kept.push(entry);
                }
            }
        }

        if dropped > 0 {
            self.manifest.replace_all(&kept).await?;
        }
        Ok(kept)
    }

    /// Download a chapter for offline reading.
    ///
    /// Never fails: the final state is returned and also published. A call
    /// for a chapter that is already downloading joins that download.
    #[instrument(skip(self, title))]
    pub async fn start_download(
        &self,
        collection_id: i64,
        chapter_id: i64,
        chapter_number: &str,
        title: Option<&str>,
    ) -> DownloadState {
        let key = ChapterKey::new(collection_id, chapter_number);
        let download = self.join_or_spawn(key, chapter_id, title.map(str::to_string));
        download.await
    }

    fn join_or_spawn(&self, key: ChapterKey, chapter_id: i64, title: Option<String>) -> SharedDownload {
        let mut inflight = self.inflight.lock();

        if let Some(running) = inflight.get(&key) {
            debug!(chapter = %key, "Joining in-flight download");
            return running.download.clone();
        }

        let id = self.next_download_id.fetch_add(1, Ordering::Relaxed);
        let cancellation_token = CancellationToken::new();
        self.status.set(&key, DownloadState::fetching());

        let manager = self.clone_for_task();
        let guard = InFlightGuard {
            inflight: Arc::clone(&self.inflight),
            key: key.clone(),
            id,
        };
        let task_key = key.clone();
        let task_token = cancellation_token.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            manager
                .run_download(&task_key, chapter_id, title.as_deref(), &task_token)
                .await
        });

        let status = Arc::clone(&self.status);
        let task_key = key.clone();
        let download = async move {
            match handle.await {
                Ok(state) => state,
                Err(e) => {
                    error!(chapter = %task_key, error = %e, "Download task aborted");
                    let state = DownloadState::failed(DownloadFailure::StorageFailed);
                    status.set(&task_key, state);
                    state
                }
            }
        }
        .boxed()
        .shared();

        inflight.insert(
            key,
            InFlight {
                id,
                download: download.clone(),
                cancellation_token,
            },
        );
        download
    }

    /// Clone for background task (avoids Arc<Arc<...>>)
    fn clone_for_task(&self) -> Self {
        Self {
            config: self.config.clone(),
            source: Arc::clone(&self.source),
            http: Arc::clone(&self.http),
            buckets: Arc::clone(&self.buckets),
            manifest: Arc::clone(&self.manifest),
            status: Arc::clone(&self.status),
            clock: Arc::clone(&self.clock),
            inflight: Arc::clone(&self.inflight),
            next_download_id: Arc::clone(&self.next_download_id),
        }
    }

    #[instrument(skip(self, key, title, cancellation_token), fields(chapter = %key))]
    async fn run_download(
        &self,
        key: &ChapterKey,
        chapter_id: i64,
        title: Option<&str>,
        cancellation_token: &CancellationToken,
    ) -> DownloadState {
        let deadline = self.config.download_deadline;

        let transfer = tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => Err(OfflineError::Cancelled),
            result = timeout(deadline, self.fetch_chapter(key, chapter_id, cancellation_token)) => {
                result.unwrap_or_else(|_| Err(OfflineError::TimedOut(deadline)))
            }
        };

        let result = match transfer {
            Ok(pages) => self.commit(key, chapter_id, title, pages).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!(chapter = %key, "Chapter saved for offline reading");
                let state = DownloadState::saved();
                self.status.set(key, state);
                state
            }
            Err(e) => self.fail(key, e).await,
        }
    }

    async fn fetch_chapter(
        &self,
        key: &ChapterKey,
        chapter_id: i64,
        cancellation_token: &CancellationToken,
    ) -> Result<Vec<String>> {
        let records = self
            .source
            .list_pages(key.collection_id, chapter_id)
            .await
            .map_err(|source| OfflineError::Lookup {
                key: key.clone(),
                source,
            })?;

        let pages: Vec<String> = order_pages(records)
            .into_iter()
            .map(|record| record.image_url)
            .collect();
        if pages.is_empty() {
            return Err(OfflineError::NoPages(key.clone()));
        }

        let total = pages.len();
        debug!(chapter = %key, total, "Found chapter pages");
        self.status.set(key, DownloadState::downloading(0));

        for (index, url) in pages.iter().enumerate() {
            if cancellation_token.is_cancelled() {
                return Err(OfflineError::Cancelled);
            }

            if self.buckets.is_cached(key, url).await? {
                debug!(url = %url, "Page already cached");
            } else {
                let body = self.fetch_page(url).await?;
                self.buckets.stage(key, url, body).await?;
            }

            self.status
                .set(key, DownloadState::downloading(progress_percent(index + 1, total)));
        }

        Ok(pages)
    }

    async fn fetch_page(&self, url: &str) -> Result<Bytes> {
        let page_timeout = self.config.page_timeout;
        let request = HttpRequest::get(url).bypass_cache().timeout(page_timeout);

        let response = timeout(page_timeout, self.http.execute(request))
            .await
            .map_err(|_| OfflineError::TimedOut(page_timeout))?
            .and_then(|response| response.error_for_status(url))
            .map_err(|source| OfflineError::Transfer {
                url: url.to_string(),
                source,
            })?;

        Ok(response.body)
    }

    async fn commit(
        &self,
        key: &ChapterKey,
        chapter_id: i64,
        title: Option<&str>,
        pages: Vec<String>,
    ) -> Result<()> {
        // A first download must not leave promoted pages without an entry
        let first_save = self.manifest.get(key).await?.is_none();

        if let Err(e) = self.buckets.promote(key, &pages).await {
            if first_save {
                self.drop_promoted(key).await;
            }
            return Err(e);
        }

        let entry = ChapterManifestEntry::new(
            key,
            chapter_id,
            title,
            pages,
            self.clock.unix_timestamp(),
        );
        if let Err(e) = self.manifest.upsert(entry).await {
            if first_save {
                self.drop_promoted(key).await;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn drop_promoted(&self, key: &ChapterKey) {
        if let Err(e) = self.buckets.remove_chapter(key).await {
            warn!(chapter = %key, error = %e, "Failed to drop unlisted chapter pages");
        }
    }

    async fn fail(&self, key: &ChapterKey, error: OfflineError) -> DownloadState {
        if self.config.partial_policy == PartialDownloadPolicy::Rollback {
            if let Err(e) = self.buckets.discard_staging(key).await {
                warn!(chapter = %key, error = %e, "Failed to discard staged pages");
            }
        }

        let state = match error.failure() {
            Some(failure) => {
                warn!(chapter = %key, %failure, error = %error, "Download failed");
                DownloadState::failed(failure)
            }
            None => {
                info!(chapter = %key, "Download cancelled");
                DownloadState::idle()
            }
        };

        self.status.set(key, state);
        state
    }

    /// Stop an in-flight download before its next page.
    ///
    /// Returns `false` when nothing was running for the chapter.
    #[instrument(skip(self))]
    pub fn cancel_download(&self, collection_id: i64, chapter_number: &str) -> bool {
        let key = ChapterKey::new(collection_id, chapter_number);
        match self.inflight.lock().get(&key) {
            Some(running) => {
                running.cancellation_token.cancel();
                info!(chapter = %key, "Cancelling download");
                true
            }
            None => false,
        }
    }

    /// Remove a chapter's manifest entry, then its cached pages.
    ///
    /// Any running download is cancelled and awaited first. When the manifest
    /// cannot be rewritten the pages are kept and the chapter ends
    /// `Error(StorageFailed)`. A failed page deletion only leaves an unlisted
    /// bucket behind, so it is logged and the chapter ends `Idle`.
    #[instrument(skip(self))]
    pub async fn delete_download(&self, collection_id: i64, chapter_number: &str) -> DownloadState {
        let key = ChapterKey::new(collection_id, chapter_number);

        let running = self
            .inflight
            .lock()
            .get(&key)
            .map(|f| (f.cancellation_token.clone(), f.download.clone()));
        if let Some((cancellation_token, download)) = running {
            cancellation_token.cancel();
            download.await;
        }

        if let Err(e) = self.manifest.remove(&key).await {
            warn!(chapter = %key, error = %e, "Failed to remove manifest entry");
            let state = DownloadState::failed(DownloadFailure::StorageFailed);
            self.status.set(&key, state);
            return state;
        }
        if let Err(e) = self.buckets.remove(&key).await {
            warn!(chapter = %key, error = %e, "Failed to delete cached pages");
        }

        info!(chapter = %key, "Removed offline chapter");
        let state = DownloadState::idle();
        self.status.set(&key, state);
        state
    }

    /// Current state of a chapter; `Idle` when untracked.
    pub fn check_status(&self, collection_id: i64, chapter_number: &str) -> DownloadState {
        self.status.get(&ChapterKey::new(collection_id, chapter_number))
    }

    pub fn is_downloading(&self, collection_id: i64, chapter_number: &str) -> bool {
        self.inflight
            .lock()
            .contains_key(&ChapterKey::new(collection_id, chapter_number))
    }

    /// Every non-idle chapter state.
    pub fn snapshot(&self) -> HashMap<ChapterKey, DownloadState> {
        self.status.snapshot()
    }

    pub fn subscribe(&self) -> StatusStream {
        self.status.subscribe()
    }

    /// Saved chapters as listed by the offline reader.
    pub async fn offline_library(&self) -> Result<Vec<ChapterManifestEntry>> {
        self.manifest.load().await
    }

    /// A cached page of a saved chapter.
    pub async fn read_page(
        &self,
        collection_id: i64,
        chapter_number: &str,
        url: &str,
    ) -> Result<Option<Bytes>> {
        self.buckets
            .read(&ChapterKey::new(collection_id, chapter_number), url)
            .await
    }

    /// Cancel every download, delete every chapter bucket and the manifest.
    ///
    /// Returns the number of manifest entries removed.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<usize> {
        let running: Vec<SharedDownload> = self
            .inflight
            .lock()
            .values()
            .map(|f| {
                f.cancellation_token.cancel();
                f.download.clone()
            })
            .collect();
        futures::future::join_all(running).await;

        let entries = self.manifest.load().await?;
        let buckets = self.buckets.remove_all().await?;
        self.manifest.clear().await?;

        for key in self.status.keys() {
            self.status.set(&key, DownloadState::idle());
        }

        info!(chapters = entries.len(), buckets, "Cleared offline library");
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::{MemoryContentCache, MemorySettingsStore};
    use bridge_traits::{error::BridgeError, http::HttpResponse, source::PageRecord};
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    mock! {
        PageSource {}

        #[async_trait]
        impl PageSource for PageSource {
            async fn list_pages(&self, collection_id: i64, chapter_id: i64) -> bridge_traits::error::Result<Vec<PageRecord>>;
        }
    }

    fn manager(source: MockPageSource, http: MockHttpClient) -> OfflineChapterManager {
        OfflineChapterManager::new(
            OfflineConfig::default(),
            Arc::new(source),
            Arc::new(http),
            Arc::new(MemorySettingsStore::new()),
            Arc::new(MemoryContentCache::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = OfflineChapterManager::new(
            OfflineConfig::default().with_bucket_prefix(""),
            Arc::new(MockPageSource::new()),
            Arc::new(MockHttpClient::new()),
            Arc::new(MemorySettingsStore::new()),
            Arc::new(MemoryContentCache::new()),
        );
        assert!(matches!(result, Err(OfflineError::Config(_))));
    }

    #[tokio::test]
    async fn test_page_requests_bypass_cache() {
        let mut source = MockPageSource::new();
        source
            .expect_list_pages()
            .withf(|collection, chapter| *collection == 42 && *chapter == 901)
            .times(1)
            .returning(|_, _| Ok(vec![PageRecord::new("https://cdn/p1.webp", 1)]));

        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                request.url == "https://cdn/p1.webp"
                    && request.headers.get("Cache-Control") == Some(&"no-cache".to_string())
                    && request.headers.get("Pragma") == Some(&"no-cache".to_string())
                    && request.timeout == Some(std::time::Duration::from_secs(30))
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "img")));

        let manager = manager(source, http);
        let state = manager.start_download(42, 901, "7", None).await;

        assert_eq!(state, DownloadState::saved());
        assert_eq!(
            manager.read_page(42, "7", "https://cdn/p1.webp").await.unwrap(),
            Some(Bytes::from_static(b"img"))
        );
        let library = manager.offline_library().await.unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library[0].title, "Chapter 7");
        assert_eq!(library[0].id, 901);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_distinct_from_no_pages() {
        let mut source = MockPageSource::new();
        source
            .expect_list_pages()
            .returning(|_, _| Err(BridgeError::OperationFailed("HTTP 500".to_string())));

        let manager = manager(source, MockHttpClient::new());
        let state = manager.start_download(1, 10, "1", None).await;

        assert_eq!(state, DownloadState::failed(DownloadFailure::LookupFailed));
        assert_eq!(manager.check_status(1, "1"), state);
    }

    #[tokio::test]
    async fn test_non_success_page_is_transfer_failure() {
        let mut source = MockPageSource::new();
        source
            .expect_list_pages()
            .returning(|_, _| Ok(vec![PageRecord::new("https://cdn/missing", 1)]));

        let mut http = MockHttpClient::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(404, "")));

        let manager = manager(source, http);
        let state = manager.start_download(1, 10, "1", None).await;

        assert_eq!(state, DownloadState::failed(DownloadFailure::TransferFailed));
        assert!(manager.offline_library().await.unwrap().is_empty());
        assert!(!manager.is_downloading(1, "1"));
    }

    #[tokio::test]
    async fn test_cancel_without_download() {
        let manager = manager(MockPageSource::new(), MockHttpClient::new());
        assert!(!manager.cancel_download(3, "3"));
    }
}
