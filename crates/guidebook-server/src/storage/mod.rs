//! Blob storage behind the backend
//!
//! Keys are `/`-separated relative paths: `countries.json` for the index,
//! `{country}/{contentPath}` for content and PDFs.

pub mod fs;
pub mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob not found: {key}")]
    NotFound { key: String },

    #[error("Invalid blob key: {key}")]
    InvalidKey { key: String },

    #[error("Storage I/O failed for {key}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Metadata of a stored blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    /// Quoted entity tag, changes on every write
    pub etag: String,
    pub updated: DateTime<Utc>,
    pub size: u64,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    async fn metadata(&self, key: &str) -> Result<BlobMeta, StorageError>;

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn write(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<BlobMeta, StorageError>;

    /// Fails with `NotFound` when the key is absent
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Keys starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Delete every key under `prefix`; returns how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let keys = self.list(prefix).await?;
        let mut removed = 0;
        for key in keys {
            match self.delete(&key).await {
                Ok(()) => removed += 1,
                Err(StorageError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}

/// Reject keys that could escape the store root
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Content type implied by a key's extension
pub fn guess_content_type(key: &str) -> String {
    if key.ends_with(".md") || key.ends_with(".markdown") {
        return "text/markdown".to_string();
    }
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
