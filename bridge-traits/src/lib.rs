//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement for the offline
//! chapter cache.
//!
//! ## Overview
//!
//! This crate defines the contract between the core library and host-specific
//! implementations. Each trait represents a capability the core requires but
//! that is provided differently per host (desktop, embedded webview, tests).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and timeouts
//! - [`PageSource`](source::PageSource) - Remote lookup of a chapter's page images
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Durable string-keyed record slots
//! - [`ContentCache`](storage::ContentCache) - Named binary buckets keyed by request URL
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Host     | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Backend  | `provider-supabase` | ✅ Available |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations
//! should convert host errors to `BridgeError` and include context such as the URL,
//! bucket or key involved.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod source;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use source::{PageRecord, PageSource};
pub use storage::{ContentCache, SettingsStore};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
