//! Offline cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{OfflineError, Result};

/// Settings slot that holds the manifest.
pub const DEFAULT_MANIFEST_KEY: &str = "offline_library";

/// Prefix of every chapter bucket name.
pub const DEFAULT_BUCKET_PREFIX: &str = "manga";

/// What happens to staged pages when a download fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialDownloadPolicy {
    /// Keep staged pages so a retry only fetches what is missing
    #[default]
    RetainStaged,
    /// Delete the staging bucket
    Rollback,
}

/// Configuration for the offline chapter manager.
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    /// Settings key of the manifest (default: `offline_library`)
    pub manifest_key: String,

    /// Bucket name prefix (default: `manga`)
    pub bucket_prefix: String,

    /// Timeout for a single page request (default: 30s)
    pub page_timeout: Duration,

    /// Upper bound for lookup plus all page transfers (default: 10 min)
    pub download_deadline: Duration,

    pub partial_policy: PartialDownloadPolicy,

    /// Drop manifest entries whose bucket is gone during `initialize`
    pub verify_on_startup: bool,

    /// Buffer of the status broadcast channel (default: 64)
    pub status_channel_capacity: usize,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            manifest_key: DEFAULT_MANIFEST_KEY.to_string(),
            bucket_prefix: DEFAULT_BUCKET_PREFIX.to_string(),
            page_timeout: Duration::from_secs(30),
            download_deadline: Duration::from_secs(600),
            partial_policy: PartialDownloadPolicy::default(),
            verify_on_startup: false,
            status_channel_capacity: 64,
        }
    }
}

impl OfflineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest_key(mut self, key: impl Into<String>) -> Self {
        self.manifest_key = key.into();
        self
    }

    pub fn with_bucket_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bucket_prefix = prefix.into();
        self
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn with_download_deadline(mut self, deadline: Duration) -> Self {
        self.download_deadline = deadline;
        self
    }

    pub fn with_partial_policy(mut self, policy: PartialDownloadPolicy) -> Self {
        self.partial_policy = policy;
        self
    }

    pub fn with_verify_on_startup(mut self, verify: bool) -> Self {
        self.verify_on_startup = verify;
        self
    }

    pub fn with_status_channel_capacity(mut self, capacity: usize) -> Self {
        self.status_channel_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.manifest_key.trim().is_empty() {
            return Err(OfflineError::Config("manifest_key cannot be empty".to_string()));
        }

        if self.bucket_prefix.trim().is_empty() {
            return Err(OfflineError::Config("bucket_prefix cannot be empty".to_string()));
        }

        if self.page_timeout.is_zero() {
            return Err(OfflineError::Config(
                "page_timeout must be greater than 0".to_string(),
            ));
        }

        if self.download_deadline < self.page_timeout {
            return Err(OfflineError::Config(
                "download_deadline must be at least page_timeout".to_string(),
            ));
        }

        // broadcast::channel panics on zero capacity
        if self.status_channel_capacity == 0 {
            return Err(OfflineError::Config(
                "status_channel_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OfflineConfig::default();
        assert_eq!(config.manifest_key, "offline_library");
        assert_eq!(config.bucket_prefix, "manga");
        assert_eq!(config.page_timeout, Duration::from_secs(30));
        assert_eq!(config.download_deadline, Duration::from_secs(600));
        assert_eq!(config.partial_policy, PartialDownloadPolicy::RetainStaged);
        assert!(!config.verify_on_startup);
        assert_eq!(config.status_channel_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(OfflineConfig::new().with_manifest_key(" ").validate().is_err());
        assert!(OfflineConfig::new().with_bucket_prefix("").validate().is_err());
        assert!(OfflineConfig::new()
            .with_page_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(OfflineConfig::new()
            .with_page_timeout(Duration::from_secs(60))
            .with_download_deadline(Duration::from_secs(10))
            .validate()
            .is_err());
        assert!(OfflineConfig::new()
            .with_status_channel_capacity(0)
            .validate()
            .is_err());
    }
}
