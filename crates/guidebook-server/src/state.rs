//! Shared handler state

use guidebook_core::EventBus;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::ServerConfig;
use crate::index::CountryIndex;
use crate::storage::BlobStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub index: Arc<CountryIndex>,
    pub events: EventBus,
    admin_password: Arc<str>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn BlobStore>, config: &ServerConfig) -> Self {
        Self {
            index: Arc::new(CountryIndex::new(store.clone())),
            store,
            events: EventBus::default_capacity(),
            admin_password: Arc::from(config.admin_password.as_str()),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    pub fn check_password(&self, candidate: &str) -> bool {
        candidate
            .as_bytes()
            .ct_eq(self.admin_password.as_bytes())
            .into()
    }
}
