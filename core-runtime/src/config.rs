//! # Core Configuration Module
//!
//! Builder-based configuration for the offline chapter cache.
//!
//! ## Overview
//!
//! [`CoreConfigBuilder`] collects the backend coordinates, the local
//! directories and the host bridges, then validates them fail-fast in
//! [`build()`](CoreConfigBuilder::build).
//!
//! ## Bridges
//!
//! - `HttpClient` - page transfers and backend queries (desktop default: reqwest)
//! - `SettingsStore` - manifest slot (desktop default: SQLite at `{data_dir}/settings.db`)
//! - `ContentCache` - page buckets (desktop default: files under `{cache_dir}`)
//! - `PageSource` - optional; when absent the service layer builds a
//!   Supabase source from `supabase_url` and `supabase_anon_key`
//!
//! Without the `desktop-shims` feature every bridge except `PageSource`
//! must be injected.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .supabase_url("https://project.supabase.co")
//!     .supabase_anon_key("public-anon-key")
//!     .data_dir("/home/reader/.local/share/rift")
//!     .cache_dir("/home/reader/.cache/rift")
//!     .build()?;
//! ```
//!
//! ### From the environment
//!
//! ```ignore
//! let config = CoreConfig::from_env()?.build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{ContentCache, HttpClient, PageSource, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;

pub const ENV_SUPABASE_URL: &str = "RIFT_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "RIFT_SUPABASE_ANON_KEY";
pub const ENV_DATA_DIR: &str = "RIFT_DATA_DIR";
pub const ENV_CACHE_DIR: &str = "RIFT_CACHE_DIR";

/// Validated runtime configuration.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the hosted backend
    pub supabase_url: Option<String>,

    /// Public (anon) API key of the hosted backend
    pub supabase_anon_key: Option<String>,

    /// Directory for durable records (the manifest database)
    pub data_dir: PathBuf,

    /// Directory for cached page bodies
    pub cache_dir: PathBuf,

    pub http_client: Arc<dyn HttpClient>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub content_cache: Arc<dyn ContentCache>,

    /// Custom page lookup; overrides the backend coordinates
    pub page_source: Option<Arc<dyn PageSource>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("supabase_url", &self.supabase_url)
            .field(
                "supabase_anon_key",
                &self.supabase_anon_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("data_dir", &self.data_dir)
            .field("cache_dir", &self.cache_dir)
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("content_cache", &"ContentCache { ... }")
            .field(
                "page_source",
                &self.page_source.as_ref().map(|_| "PageSource { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Builder pre-filled from `RIFT_*` environment variables.
    pub fn from_env() -> Result<CoreConfigBuilder> {
        CoreConfigBuilder::default().with_env()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.page_source.is_some() {
            return Ok(());
        }

        let url = self.supabase_url.as_deref().ok_or_else(|| {
            Error::Config(
                "Supabase URL is required unless a PageSource is injected. \
                 Use .supabase_url() or set RIFT_SUPABASE_URL."
                    .to_string(),
            )
        })?;

        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(Error::Config(format!(
                "Supabase URL must be an http(s) URL, got '{}'",
                url
            )));
        }

        match self.supabase_anon_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(Error::Config(
                "Supabase anon key is required unless a PageSource is injected. \
                 Use .supabase_anon_key() or set RIFT_SUPABASE_ANON_KEY."
                    .to_string(),
            )),
        }
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, default_impl: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{capability} implementation is required. \
             Desktop: enable the 'desktop-shims' feature to use the default {default_impl}. \
             Other hosts: inject a native implementation through the builder."
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing("HttpClient", "ReqwestHttpClient"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_content_cache(cache_dir: &std::path::Path) -> Result<Arc<dyn ContentCache>> {
    use bridge_desktop::FsContentCache;

    Ok(Arc::new(FsContentCache::with_root(cache_dir.to_path_buf())))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_content_cache(_cache_dir: &std::path::Path) -> Result<Arc<dyn ContentCache>> {
    Err(capability_missing("ContentCache", "FsContentCache"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(data_dir: &std::path::Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let db_path = data_dir.join("settings.db");

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics inside a runtime, so hop to a plain thread there
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(db_path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(db_path)?,
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_data_dir: &std::path::Path) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing("SettingsStore", "SqliteSettingsStore"))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    data_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    content_cache: Option<Arc<dyn ContentCache>>,
    page_source: Option<Arc<dyn PageSource>>,
}

impl CoreConfigBuilder {
    /// Sets the backend base URL, e.g. `https://project.supabase.co`.
    ///
    /// A trailing slash is dropped.
    pub fn supabase_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.supabase_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn supabase_anon_key(mut self, key: impl Into<String>) -> Self {
        self.supabase_anon_key = Some(key.into());
        self
    }

    /// Sets the directory that holds `settings.db`.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the root directory of the page cache.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn content_cache(mut self, cache: Arc<dyn ContentCache>) -> Self {
        self.content_cache = Some(cache);
        self
    }

    /// Injects a custom page lookup. Backend coordinates become optional.
    pub fn page_source(mut self, source: Arc<dyn PageSource>) -> Self {
        self.page_source = Some(source);
        self
    }

    /// Fills unset fields from `RIFT_*` environment variables.
    ///
    /// Values already set on the builder win. Missing variables are
    /// ignored; non-UTF-8 values are an error.
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|name| match std::env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(Error::Env {
                name: name.to_string(),
                message: "value is not valid UTF-8".to_string(),
            }),
        })
    }

    fn with_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        let non_empty = |name: &str| -> Result<Option<String>> {
            Ok(lookup(name)?.filter(|v| !v.trim().is_empty()))
        };

        if self.supabase_url.is_none() {
            if let Some(url) = non_empty(ENV_SUPABASE_URL)? {
                self = self.supabase_url(url);
            }
        }
        if self.supabase_anon_key.is_none() {
            self.supabase_anon_key = non_empty(ENV_SUPABASE_ANON_KEY)?;
        }
        if self.data_dir.is_none() {
            self.data_dir = non_empty(ENV_DATA_DIR)?.map(PathBuf::from);
        }
        if self.cache_dir.is_none() {
            self.cache_dir = non_empty(ENV_CACHE_DIR)?.map(PathBuf::from);
        }

        Ok(self)
    }

    /// Builds and validates the configuration.
    ///
    /// Returns an error if a directory is missing, a required bridge is
    /// missing and no desktop default is available, or the backend
    /// coordinates are invalid.
    pub fn build(self) -> Result<CoreConfig> {
        let data_dir = self.data_dir.ok_or_else(|| {
            Error::Config(
                "Data directory is required. Use .data_dir() or set RIFT_DATA_DIR.".to_string(),
            )
        })?;

        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config(
                "Cache directory is required. Use .cache_dir() or set RIFT_CACHE_DIR."
                    .to_string(),
            )
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&data_dir)?,
        };

        let content_cache = match self.content_cache {
            Some(cache) => cache,
            None => provide_default_content_cache(&cache_dir)?,
        };

        let config = CoreConfig {
            supabase_url: self.supabase_url,
            supabase_anon_key: self.supabase_anon_key,
            data_dir,
            cache_dir,
            http_client,
            settings_store,
            content_cache,
            page_source: self.page_source,
        };

        config.validate()?;
        Ok(config)
    }
}
