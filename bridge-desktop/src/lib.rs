//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `ContentCache` using one directory per bucket under the user cache dir
//! - In-memory `SettingsStore`/`ContentCache` for tests and ephemeral sessions
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FsContentCache, ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let cache = FsContentCache::new();
//!     let settings = SqliteSettingsStore::new("rift/settings.db".into()).await?;
//! }
//! ```

mod content_cache;
mod http;
mod memory;
mod settings;

pub use content_cache::FsContentCache;
pub use http::ReqwestHttpClient;
pub use memory::{MemoryContentCache, MemorySettingsStore};
pub use settings::SqliteSettingsStore;
