//! Workspace umbrella crate.
//!
//! Exposes the feature flags that map onto the individual workspace crates
//! (`core-service`, `core-offline`) so host applications can depend on
//! `rift-workspace` without wiring every crate by hand.

#[cfg(feature = "desktop-shims")]
pub use core_offline::{
    ChapterKey, ChapterManifestEntry, DownloadAction, DownloadState, DownloadStatus,
    OfflineChapterManager, OfflineConfig,
};
#[cfg(feature = "desktop-shims")]
pub use core_service::{bootstrap, bootstrap_desktop, CoreConfig, CoreError, CoreService};
