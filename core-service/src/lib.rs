//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, settings,
//! content cache, page lookup) into the offline chapter cache. Desktop apps
//! typically enable the `desktop-shims` feature, which lets [`CoreConfig`]
//! fall back to the `bridge-desktop` adapters for any bridge left unset.
//!
//! ```ignore
//! use core_offline::OfflineConfig;
//! use core_service::bootstrap_desktop;
//!
//! let core = bootstrap_desktop(OfflineConfig::default()).await?;
//! let state = core.start_download(42, 901, "7", None).await;
//! println!("{}", state.label());
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_runtime::config::{CoreConfig, CoreConfigBuilder};
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::PageSource;
use bytes::Bytes;
use core_offline::{
    ChapterKey, ChapterManifestEntry, DownloadState, OfflineChapterManager, OfflineConfig,
    StatusStream,
};
use provider_supabase::SupabasePageSource;
use tracing::info;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    offline: Arc<OfflineChapterManager>,
}

impl CoreService {
    /// Wrap an already initialized manager.
    pub fn new(offline: OfflineChapterManager) -> Self {
        Self {
            offline: Arc::new(offline),
        }
    }

    /// Access the underlying offline chapter manager.
    pub fn offline(&self) -> Arc<OfflineChapterManager> {
        Arc::clone(&self.offline)
    }

    pub async fn start_download(
        &self,
        collection_id: i64,
        chapter_id: i64,
        chapter_number: &str,
        title: Option<&str>,
    ) -> DownloadState {
        self.offline
            .start_download(collection_id, chapter_id, chapter_number, title)
            .await
    }

    pub fn cancel_download(&self, collection_id: i64, chapter_number: &str) -> bool {
        self.offline.cancel_download(collection_id, chapter_number)
    }

    pub async fn delete_download(&self, collection_id: i64, chapter_number: &str) -> DownloadState {
        self.offline
            .delete_download(collection_id, chapter_number)
            .await
    }

    pub fn check_status(&self, collection_id: i64, chapter_number: &str) -> DownloadState {
        self.offline.check_status(collection_id, chapter_number)
    }

    pub fn snapshot(&self) -> HashMap<ChapterKey, DownloadState> {
        self.offline.snapshot()
    }

    pub fn subscribe(&self) -> StatusStream {
        self.offline.subscribe()
    }

    pub async fn offline_library(&self) -> Result<Vec<ChapterManifestEntry>> {
        Ok(self.offline.offline_library().await?)
    }

    pub async fn read_page(
        &self,
        collection_id: i64,
        chapter_number: &str,
        url: &str,
    ) -> Result<Option<Bytes>> {
        Ok(self
            .offline
            .read_page(collection_id, chapter_number, url)
            .await?)
    }

    pub async fn clear_all(&self) -> Result<usize> {
        Ok(self.offline.clear_all().await?)
    }
}

/// Build the service from a validated configuration and restore saved
/// chapters from the manifest.
///
/// Uses the injected `PageSource` when present, otherwise a Supabase source
/// over the configured HTTP client.
pub async fn bootstrap(config: CoreConfig, offline: OfflineConfig) -> Result<CoreService> {
    let source = page_source(&config)?;

    let manager = OfflineChapterManager::new(
        offline,
        source,
        Arc::clone(&config.http_client),
        Arc::clone(&config.settings_store),
        Arc::clone(&config.content_cache),
    )?;

    let restored = manager.initialize().await?;
    info!(restored, "Core service ready");

    Ok(CoreService::new(manager))
}

/// Convenience bootstrapper for desktop hosts.
///
/// Reads `RIFT_*` environment variables and fills every unset bridge with
/// its desktop default.
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(offline: OfflineConfig) -> Result<CoreService> {
    let config = CoreConfig::from_env()?.build()?;
    bootstrap(config, offline).await
}

fn page_source(config: &CoreConfig) -> Result<Arc<dyn PageSource>> {
    if let Some(source) = &config.page_source {
        return Ok(Arc::clone(source));
    }

    let (Some(url), Some(key)) = (&config.supabase_url, &config.supabase_anon_key) else {
        return Err(CoreError::CapabilityMissing {
            capability: "PageSource".to_string(),
            message: "Inject a PageSource or configure the Supabase URL and anon key".to_string(),
        });
    };

    let source = SupabasePageSource::new(Arc::clone(&config.http_client), url.as_str(), key.as_str())?;
    Ok(Arc::new(source))
}
