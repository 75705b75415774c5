//! guidebook-core - Core library for guidebook
//!
//! Provides the persistent content cache, the stale-while-revalidate
//! loader, the backend API client and the admin session.

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod fetcher;
pub mod loader;
pub mod record;
pub mod session;
pub mod view;

pub use cache::{CacheConfig, CacheStats, ContentCache, RevalidatedWrite};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{ContentError, ErrorClass};
pub use event::{DataEvent, EventBus};
pub use fetcher::ContentFetcher;
pub use loader::{ContentLoad, ContentLoader, LoadSource, Revalidation};
pub use record::ContentRecord;
pub use session::{AdminSession, SessionState};
pub use view::{ContentState, ContentView};
