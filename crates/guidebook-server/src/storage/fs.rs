//! Filesystem-backed blob store
//!
//! Writes land in a hidden staging directory under the root and are
//! renamed into place, so listings never see partial files. Entity tags
//! combine size, mtime and a digest of the bytes.

use super::{guess_content_type, validate_key, BlobMeta, BlobStore, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Staging directory for in-flight writes, never exposed as keys
const STAGING_DIR: &str = ".staging";

/// Blobs stored as plain files under a root directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| StorageError::Io {
                key: root.display().to_string(),
                source,
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        if key.split('/').next() == Some(STAGING_DIR) {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn metadata(&self, key: &str) -> Result<BlobMeta, StorageError> {
        let path = self.resolve(key)?;
        let meta = fs::metadata(&path).await.map_err(|e| map_io(key, e))?;
        if !meta.is_file() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }

        let modified = meta.modified().map_err(|e| map_io(key, e))?;
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        // Coarse mtimes can repeat across same-length edits; the digest can't
        let bytes = fs::read(&path).await.map_err(|e| map_io(key, e))?;
        let digest = Sha256::digest(&bytes);

        Ok(BlobMeta {
            etag: format!(
                "\"{:x}-{:x}-{}\"",
                meta.len(),
                nanos,
                hex::encode(&digest[..8])
            ),
            updated: DateTime::<Utc>::from(modified),
            size: meta.len(),
            content_type: guess_content_type(key),
        })
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        fs::read(&path).await.map_err(|e| map_io(key, e))
    }

    async fn write(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<BlobMeta, StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(key, e))?;
        }

        let staging = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging)
            .await
            .map_err(|e| map_io(key, e))?;

        let tmp = staging.join(uuid::Uuid::new_v4().simple().to_string());
        fs::write(&tmp, &bytes).await.map_err(|e| map_io(key, e))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(map_io(key, e));
        }

        debug!(key, size = bytes.len(), "Blob written");
        self.metadata(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        fs::remove_file(&path).await.map_err(|e| map_io(key, e))?;
        debug!(key, "Blob deleted");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let root = self.root.clone();
        let owned_prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || scan_keys(&root, &owned_prefix))
            .await
            .map_err(|e| StorageError::Io {
                key: prefix.to_string(),
                source: std::io::Error::other(e),
            })?
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let keys = self.list(prefix).await?;
        let mut removed = 0;
        for key in &keys {
            match self.delete(key).await {
                Ok(()) => removed += 1,
                Err(StorageError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        // Drop the now-empty directory of a whole-country prefix
        if let Some(dir) = prefix.strip_suffix('/') {
            if let Ok(path) = self.resolve(dir) {
                let _ = fs::remove_dir_all(path).await;
            }
        }
        Ok(removed)
    }
}

fn map_io(key: &str, source: std::io::Error) -> StorageError {
    if source.kind() == ErrorKind::NotFound {
        StorageError::NotFound {
            key: key.to_string(),
        }
    } else {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

/// Every key under `root` starting with `prefix`, sorted
fn scan_keys(root: &Path, prefix: &str) -> Result<Vec<String>, StorageError> {
    let mut keys = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == STAGING_DIR));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Removed between listing and visiting
            Err(e) if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) => continue,
            Err(e) => {
                return Err(StorageError::Io {
                    key: e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string()),
                    source: e.into(),
                })
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(key) = key_of(root, entry.path()) {
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
    }

    keys.sort();
    Ok(keys)
}

fn key_of(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(segments.join("/"))
}
