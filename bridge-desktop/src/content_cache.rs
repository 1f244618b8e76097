//! Content Cache using the local file system
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<url-encoded bucket>/<sha256(url)>.body
//! <root>/<url-encoded bucket>/<sha256(url)>.url
//! ```
//!
//! The `.url` sidecar keeps the original request URL so `keys()` can list it.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::ContentCache,
};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const BODY_EXT: &str = "body";
const URL_EXT: &str = "url";

/// Directory-per-bucket content cache
pub struct FsContentCache {
    root: PathBuf,
}

impl FsContentCache {
    /// Cache rooted in the platform cache directory
    pub fn new() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("project-rift")
            .join("offline");
        Self { root }
    }

    /// Cache rooted at `root`
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(urlencoding::encode(bucket).as_ref())
    }

    fn entry_stem(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    fn entry_paths(&self, bucket: &str, url: &str) -> (PathBuf, PathBuf) {
        let dir = self.bucket_dir(bucket);
        let stem = Self::entry_stem(url);
        (
            dir.join(format!("{}.{}", stem, BODY_EXT)),
            dir.join(format!("{}.{}", stem, URL_EXT)),
        )
    }

    /// Write through a temp file so a crash never leaves a torn body behind.
    async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn remove_if_exists(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}

impl Default for FsContentCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentCache for FsContentCache {
    async fn has_bucket(&self, bucket: &str) -> Result<bool> {
        Ok(fs::try_exists(self.bucket_dir(bucket)).await?)
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<bool> {
        match fs::remove_dir_all(self.bucket_dir(bucket)).await {
            Ok(()) => {
                debug!(bucket, "Deleted cache bucket");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        let mut buckets = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let decoded = urlencoding::decode(&name)
                .map_err(|e| BridgeError::StorageError(format!("Bad bucket dir {}: {}", name, e)))?;
            buckets.push(decoded.into_owned());
        }
        buckets.sort();
        Ok(buckets)
    }

    async fn contains(&self, bucket: &str, url: &str) -> Result<bool> {
        let (body, _) = self.entry_paths(bucket, url);
        Ok(fs::try_exists(body).await?)
    }

    async fn get(&self, bucket: &str, url: &str) -> Result<Option<Bytes>> {
        let (body, _) = self.entry_paths(bucket, url);
        match fs::read(&body).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn put(&self, bucket: &str, url: &str, body: Bytes) -> Result<()> {
        let dir = self.bucket_dir(bucket);
        fs::create_dir_all(&dir).await?;

        let (body_path, url_path) = self.entry_paths(bucket, url);
        // Sidecar first: a body without its URL would be invisible to keys()
        Self::write_atomic(&url_path, url.as_bytes()).await?;
        Self::write_atomic(&body_path, &body).await?;

        debug!(bucket, url, bytes = body.len(), "Stored cache entry");
        Ok(())
    }

    async fn delete(&self, bucket: &str, url: &str) -> Result<bool> {
        let (body_path, url_path) = self.entry_paths(bucket, url);
        let removed = Self::remove_if_exists(&body_path).await?;
        Self::remove_if_exists(&url_path).await?;
        Ok(removed)
    }

    async fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(self.bucket_dir(bucket)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(URL_EXT) {
                continue;
            }
            // Only count entries whose body landed
            if !fs::try_exists(path.with_extension(BODY_EXT)).await? {
                continue;
            }
            let url = fs::read_to_string(&path).await?;
            keys.push(url);
        }
        keys.sort();
        Ok(keys)
    }
}
