//! Country index persisted as the `countries.json` blob
//!
//! Reads go through a short-lived moka cache; every write goes through a
//! single async mutex (read-modify-write of the whole index) and then
//! invalidates the cache.

use anyhow::Context;
use guidebook_types::{Country, CountryPatch, NewCountry};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::storage::{BlobStore, StorageError};

pub const INDEX_KEY: &str = "countries.json";
const INDEX_TTL: Duration = Duration::from_secs(5);

pub struct CountryIndex {
    store: Arc<dyn BlobStore>,
    cache: Cache<&'static str, Arc<Vec<Country>>>,
    write_lock: Mutex<()>,
}

impl CountryIndex {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(INDEX_TTL)
            .build();

        Self {
            store,
            cache,
            write_lock: Mutex::new(()),
        }
    }

    /// All countries in stored order
    pub async fn list(&self) -> Arc<Vec<Country>> {
        if let Some(countries) = self.cache.get(INDEX_KEY).await {
            return countries;
        }

        let countries = self.read_index().await.unwrap_or_else(|e| {
            warn!(error = %format!("{e:#}"), "Country index unreadable, listing as empty");
            Vec::new()
        });
        let countries = Arc::new(countries);
        self.cache.insert(INDEX_KEY, countries.clone()).await;
        countries
    }

    pub async fn get(&self, slug: &str) -> Option<Country> {
        self.list().await.iter().find(|c| c.slug == slug).cloned()
    }

    pub async fn create(&self, new: NewCountry) -> Result<Country, ApiError> {
        if new.name.trim().is_empty() || new.slug.trim().is_empty() {
            return Err(ApiError::bad_request("Country name and slug are required"));
        }
        check_palette(&new.palette)?;

        let _guard = self.write_lock.lock().await;
        let mut countries = self.load_for_write("Failed to create country").await?;

        if countries.iter().any(|c| c.slug == new.slug) {
            return Err(ApiError::bad_request("Country slug already exists"));
        }

        let country = new.into_country(uuid::Uuid::new_v4().to_string());
        countries.push(country.clone());
        self.save(&countries, "Failed to create country").await?;

        info!(slug = %country.slug, id = %country.id, "Country created");
        Ok(country)
    }

    /// Shallow-merge `patch` over the country currently at `slug`
    pub async fn update(&self, slug: &str, patch: CountryPatch) -> Result<Country, ApiError> {
        if let Some(palette) = &patch.palette {
            check_palette(palette)?;
        }

        let _guard = self.write_lock.lock().await;
        let mut countries = self.load_for_write("Failed to update country").await?;

        let position = countries
            .iter()
            .position(|c| c.slug == slug)
            .ok_or(ApiError::NotFound("Country not found"))?;

        if let Some(new_slug) = patch.slug.as_deref() {
            if new_slug.trim().is_empty() {
                return Err(ApiError::bad_request("Country slug cannot be empty"));
            }
            if new_slug != slug && countries.iter().any(|c| c.slug == new_slug) {
                return Err(ApiError::bad_request("Country slug already exists"));
            }
        }

        patch.apply_to(&mut countries[position]);
        let country = countries[position].clone();
        self.save(&countries, "Failed to update country").await?;

        info!(slug, "Country updated");
        Ok(country)
    }

    /// Remove the country from the index; its blobs are left to the caller
    pub async fn delete(&self, slug: &str) -> Result<Country, ApiError> {
        let _guard = self.write_lock.lock().await;
        let mut countries = self.load_for_write("Failed to delete country").await?;

        let position = countries
            .iter()
            .position(|c| c.slug == slug)
            .ok_or(ApiError::NotFound("Country not found"))?;

        let removed = countries.remove(position);
        self.save(&countries, "Failed to delete country").await?;

        info!(slug, "Country deleted");
        Ok(removed)
    }

    /// Stored index; a missing blob is an empty index
    async fn read_index(&self) -> anyhow::Result<Vec<Country>> {
        let bytes = match self.store.read(INDEX_KEY).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound { .. }) => {
                debug!("Country index not found, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e).context("Failed to read country index"),
        };

        serde_json::from_slice(&bytes).context("Country index is corrupt")
    }

    /// Writes rewrite the whole index, so an unreadable one must not pass as empty
    async fn load_for_write(&self, failure: &'static str) -> Result<Vec<Country>, ApiError> {
        self.read_index()
            .await
            .map_err(|e| ApiError::internal(failure, e))
    }

    async fn save(&self, countries: &[Country], failure: &'static str) -> Result<(), ApiError> {
        let bytes =
            serde_json::to_vec_pretty(countries).map_err(|e| ApiError::internal(failure, e))?;

        let result = self
            .store
            .write(INDEX_KEY, bytes, "application/json")
            .await
            .map_err(|e| ApiError::internal(failure, e));

        self.cache.invalidate(INDEX_KEY).await;
        result.map(|_| ())
    }
}

fn check_palette(palette: &guidebook_types::ColorPalette) -> Result<(), ApiError> {
    let invalid = palette.invalid_fields();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Invalid palette colors: {}",
            invalid.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BlobMeta, MemoryBlobStore};
    use async_trait::async_trait;
    use guidebook_types::ColorPalette;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose reads can be switched to fail with EIO
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryBlobStore,
        fail_reads: AtomicBool,
    }

    #[async_trait]
    impl BlobStore for FlakyStore {
        async fn exists(&self, key: &str) -> Result<bool, StorageError> {
            self.inner.exists(key).await
        }

        async fn metadata(&self, key: &str) -> Result<BlobMeta, StorageError> {
            self.inner.metadata(key).await
        }

        async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StorageError::Io {
                    key: key.to_string(),
                    source: std::io::Error::from_raw_os_error(5),
                });
            }
            self.inner.read(key).await
        }

        async fn write(
            &self,
            key: &str,
            bytes: Vec<u8>,
            content_type: &str,
        ) -> Result<BlobMeta, StorageError> {
            self.inner.write(key, bytes, content_type).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list(prefix).await
        }
    }

    fn stored_slugs(bytes: &[u8]) -> Vec<String> {
        serde_json::from_slice::<Vec<Country>>(bytes)
            .unwrap()
            .into_iter()
            .map(|c| c.slug)
            .collect()
    }

    fn index() -> (Arc<MemoryBlobStore>, CountryIndex) {
        let store = Arc::new(MemoryBlobStore::new());
        let index = CountryIndex::new(store.clone());
        (store, index)
    }

    #[tokio::test]
    async fn test_empty_when_missing() {
        let (_store, index) = index();
        assert!(index.list().await.is_empty());
        assert!(index.get("italy").await.is_none());
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_persists() {
        let (store, index) = index();
        let italy = index.create(NewCountry::named("Italy")).await.unwrap();

        assert_eq!(italy.slug, "italy");
        assert_eq!(italy.id.len(), 36);

        let stored: Vec<Country> =
            serde_json::from_slice(&store.read(INDEX_KEY).await.unwrap()).unwrap();
        assert_eq!(stored, vec![italy.clone()]);
        assert_eq!(index.get("italy").await, Some(italy));
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let (_store, index) = index();
        index.create(NewCountry::named("Italy")).await.unwrap();

        let err = index.create(NewCountry::named("Italy")).await.unwrap_err();
        assert_eq!(err.to_string(), "Country slug already exists");
    }

    #[tokio::test]
    async fn test_update_merges_and_checks_slug() {
        let (_store, index) = index();
        index.create(NewCountry::named("Italy")).await.unwrap();
        index.create(NewCountry::named("Japan")).await.unwrap();

        let patch = CountryPatch {
            description: Some("Pasta".to_string()),
            ..Default::default()
        };
        let italy = index.update("italy", patch).await.unwrap();
        assert_eq!(italy.description.as_deref(), Some("Pasta"));
        assert_eq!(italy.name, "Italy");

        let clash = CountryPatch {
            slug: Some("japan".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            index.update("italy", clash).await,
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            index.update("france", CountryPatch::default()).await,
            Err(ApiError::NotFound("Country not found"))
        ));
    }

    #[tokio::test]
    async fn test_invalid_palette_rejected() {
        let (_store, index) = index();
        let mut new = NewCountry::named("Italy");
        new.palette = ColorPalette {
            primary: "blue".to_string(),
            ..Default::default()
        };

        let err = index.create(new).await.unwrap_err();
        assert!(err.to_string().contains("primary"));
    }

    #[tokio::test]
    async fn test_delete_invalidates_cached_list() {
        let (_store, index) = index();
        index.create(NewCountry::named("Italy")).await.unwrap();
        assert_eq!(index.list().await.len(), 1);

        index.delete("italy").await.unwrap();
        assert!(index.list().await.is_empty());
        assert!(matches!(
            index.delete("italy").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_index_reads_empty() {
        let (store, index) = index();
        store.write(INDEX_KEY, b"not json".to_vec(), "").await.unwrap();
        assert!(index.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_index_blocks_writes() {
        let store = Arc::new(FlakyStore::default());
        let index = CountryIndex::new(store.clone());
        index.create(NewCountry::named("Italy")).await.unwrap();
        index.create(NewCountry::named("Japan")).await.unwrap();

        store.fail_reads.store(true, Ordering::SeqCst);

        let err = index.create(NewCountry::named("Peru")).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal { .. }));
        assert_eq!(err.to_string(), "Failed to create country");
        assert!(matches!(
            index.update("italy", CountryPatch::default()).await,
            Err(ApiError::Internal { .. })
        ));
        assert!(matches!(
            index.delete("japan").await,
            Err(ApiError::Internal { .. })
        ));

        store.fail_reads.store(false, Ordering::SeqCst);
        let bytes = store.read(INDEX_KEY).await.unwrap();
        assert_eq!(stored_slugs(&bytes), vec!["italy", "japan"]);
    }

    #[tokio::test]
    async fn test_corrupt_index_is_not_overwritten() {
        let (store, index) = index();
        store.write(INDEX_KEY, b"not json".to_vec(), "").await.unwrap();

        let err = index.create(NewCountry::named("Italy")).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal { .. }));
        assert_eq!(store.read(INDEX_KEY).await.unwrap(), b"not json");
    }
}
