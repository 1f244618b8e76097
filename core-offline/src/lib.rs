//! # Offline Chapter Cache
//!
//! Downloads manga chapters page by page into a local content cache so they
//! can be read without a connection.
//!
//! ## Overview
//!
//! - [`OfflineChapterManager`] - start, cancel, delete and inspect downloads
//! - [`ManifestStore`] - the durable list of saved chapters
//! - [`ChapterBuckets`] - per-chapter page buckets plus their staging buckets
//! - [`DownloadStatusStore`] - shared in-memory state with change notifications
//!
//! ## Lifecycle of a download
//!
//! ```text
//! Idle ─► Fetching ─► Downloading(0..100) ─► Saved
//!            │              │
//!            └──────────────┴─► Error(kind)      (cancel ─► Idle)
//! ```
//!
//! Pages land in a `{prefix}-staging-…` bucket and are promoted into the
//! chapter bucket only after every page arrived; the manifest entry is
//! written last. A chapter counts as saved only while both exist.

pub mod bucket;
pub mod config;
pub mod error;
pub mod manager;
pub mod manifest;
pub mod models;
pub mod status;

pub use bucket::ChapterBuckets;
pub use config::{OfflineConfig, PartialDownloadPolicy};
pub use error::{OfflineError, Result};
pub use manager::OfflineChapterManager;
pub use manifest::ManifestStore;
pub use models::{
    ChapterKey, ChapterManifestEntry, DownloadAction, DownloadFailure, DownloadState,
    DownloadStatus,
};
pub use status::{DownloadStatusStore, StatusStream, StatusUpdate};
