//! Caching layer for guidebook-core
//!
//! Provides the SQLite-based content cache behind the stale-while-revalidate loader.

pub mod content_cache;

pub use content_cache::{
    CacheConfig, CacheStats, ContentCache, RevalidatedWrite, CACHE_DB_FILE, CACHE_TTL,
};
