//! # Offline Cache Error Types

use bridge_traits::error::BridgeError;
use std::time::Duration;
use thiserror::Error;

use crate::models::{ChapterKey, DownloadFailure};

/// Errors raised inside the offline chapter cache.
///
/// Download operations never surface these to callers directly; they are
/// turned into a [`DownloadFailure`] on the chapter's state.
#[derive(Error, Debug)]
pub enum OfflineError {
    /// The page lookup on the backend failed
    #[error("Page lookup failed for {key}: {source}")]
    Lookup {
        key: ChapterKey,
        #[source]
        source: BridgeError,
    },

    /// The backend answered but listed no pages
    #[error("No pages found for {0}")]
    NoPages(ChapterKey),

    /// A page could not be fetched from its origin
    #[error("Failed to fetch page {url}: {source}")]
    Transfer {
        url: String,
        #[source]
        source: BridgeError,
    },

    /// Reading or writing local storage failed
    #[error("Storage error ({context}): {source}")]
    Storage {
        context: String,
        #[source]
        source: BridgeError,
    },

    /// The manifest slot holds something that is not a manifest
    #[error("Corrupt manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Invalid offline configuration: {0}")]
    Config(String),
}

impl OfflineError {
    pub(crate) fn storage(context: impl Into<String>, source: BridgeError) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    /// Failure kind to publish for this error.
    ///
    /// `None` for cancellation, which ends a download as `Idle` rather than
    /// as an error.
    pub fn failure(&self) -> Option<DownloadFailure> {
        match self {
            Self::Lookup { .. } => Some(DownloadFailure::LookupFailed),
            Self::NoPages(_) => Some(DownloadFailure::NoPages),
            Self::Transfer { .. } => Some(DownloadFailure::TransferFailed),
            Self::Storage { .. } | Self::Manifest(_) | Self::Config(_) => {
                Some(DownloadFailure::StorageFailed)
            }
            Self::TimedOut(_) => Some(DownloadFailure::TimedOut),
            Self::Cancelled => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, OfflineError>;
