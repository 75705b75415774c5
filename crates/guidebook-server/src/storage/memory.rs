//! In-memory blob store

use super::{validate_key, BlobMeta, BlobStore, StorageError};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct Blob {
    bytes: Vec<u8>,
    meta: BlobMeta,
}

/// Blob store held in a `DashMap`, used by tests and ephemeral servers
///
/// Every write takes the next generation number, so etags never repeat
/// within one store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Blob>,
    generation: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.blobs.contains_key(key))
    }

    async fn metadata(&self, key: &str) -> Result<BlobMeta, StorageError> {
        validate_key(key)?;
        self.blobs
            .get(key)
            .map(|blob| blob.meta.clone())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        self.blobs
            .get(key)
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn write(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<BlobMeta, StorageError> {
        validate_key(key)?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let content_type = if content_type.is_empty() {
            super::guess_content_type(key)
        } else {
            content_type.to_string()
        };

        let meta = BlobMeta {
            etag: format!("\"{generation}\""),
            updated: Utc::now(),
            size: bytes.len() as u64,
            content_type,
        };
        self.blobs.insert(
            key.to_string(),
            Blob {
                bytes,
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.blobs
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .blobs
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generation_etags_change_on_rewrite() {
        let store = MemoryBlobStore::new();

        let first = store.write("italy/rome.md", b"a".to_vec(), "").await.unwrap();
        let second = store.write("italy/rome.md", b"a".to_vec(), "").await.unwrap();

        assert_ne!(first.etag, second.etag);
        assert_eq!(second.content_type, "text/markdown");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_prefix_default_impl() {
        let store = MemoryBlobStore::new();
        for key in ["italy/a.md", "italy/b/c.pdf", "italyish/x.md", "japan/a.md"] {
            store.write(key, vec![0], "").await.unwrap();
        }

        assert_eq!(store.delete_prefix("italy/").await.unwrap(), 2);
        assert_eq!(store.list("").await.unwrap(), vec!["italyish/x.md", "japan/a.md"]);
        assert!(matches!(
            store.delete("italy/a.md").await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
