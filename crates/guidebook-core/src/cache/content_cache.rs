//! SQLite content cache
//!
//! Persists the last fetched body of every `(country, path)` the viewer has
//! opened, so pages render instantly and offline.
//!
//! Schema:
//! - content table: key = `country/path`, body + version tag + timestamps
//! - Index: country_slug for bulk invalidation of one country
//!
//! Invalidation:
//! - Lazy TTL expiry: `get` deletes rows older than the TTL
//! - Explicit: `invalidate(country, path)` / `invalidate(country, None)`
//! - Startup: compare cache_version → auto-clear if mismatch
//!
//! Cache Version History:
//! - v1: Initial version
//! - v2: last_modified stored as epoch millis instead of RFC 3339 text

use crate::clock::{Clock, SystemClock};
use crate::error::ContentError;
use crate::record::{cache_key, ContentRecord};
use anyhow::Context;
use chrono::{DateTime, Utc};
use guidebook_types::ContentData;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Current cache version
///
/// Increment when the row layout or the meaning of a column changes; a
/// mismatch clears the cache on open.
const CACHE_VERSION: i32 = 2;

/// File name of the cache database inside the cache directory
pub const CACHE_DB_FILE: &str = "content-cache.db";

/// Maximum age of a record served as a hit (24 hours)
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const SELECT_COLUMNS: &str =
    "country_slug, content_path, body, version_tag, last_modified, cached_at";

/// Tunables for the content cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Records older than this are treated as absent
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: CACHE_TTL }
    }
}

/// SQLite-backed content cache (thread-safe)
pub struct ContentCache {
    conn: Mutex<Connection>,
    cache_path: PathBuf,
    ttl_millis: i64,
    clock: Arc<dyn Clock>,
}

impl ContentCache {
    /// Create or open the cache database in `cache_dir`
    pub fn open(cache_dir: &Path, config: CacheConfig) -> Result<Self, ContentError> {
        Self::open_with_clock(cache_dir, config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        cache_dir: &Path,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ContentError> {
        let cache_path = cache_dir.join(CACHE_DB_FILE);
        let conn = init_database(cache_dir, &cache_path)
            .map_err(|e| ContentError::storage(format!("{e:#}")))?;

        debug!(path = %cache_path.display(), "Content cache initialized");

        Ok(Self {
            conn: Mutex::new(conn),
            cache_path,
            ttl_millis: i64::try_from(config.ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    /// Get a record if present and younger than the TTL
    ///
    /// An expired record is deleted before returning `None`.
    pub fn get(
        &self,
        country_slug: &str,
        content_path: &str,
    ) -> Result<Option<ContentRecord>, ContentError> {
        let key = cache_key(country_slug, content_path);
        let now = self.clock.now().timestamp_millis();

        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM content WHERE key = ?"),
                    params![key],
                    record_from_row,
                )
                .optional()
                .context("Failed to query cache")?;

            let Some(record) = record else {
                debug!(key = %key, "Cache miss");
                return Ok(None);
            };

            let age = now - record.cached_at.timestamp_millis();
            if age > self.ttl_millis {
                conn.execute("DELETE FROM content WHERE key = ?", params![key])
                    .context("Failed to delete expired entry")?;
                debug!(key = %key, age_ms = age, "Cache entry expired");
                return Ok(None);
            }

            debug!(key = %key, version = %record.version_tag, "Cache hit");
            Ok(Some(record))
        })
    }

    /// Store a record, unconditionally replacing any previous one
    pub fn put(
        &self,
        country_slug: &str,
        content_path: &str,
        data: &ContentData,
    ) -> Result<ContentRecord, ContentError> {
        let record = ContentRecord::from_data(
            country_slug,
            content_path,
            data.clone(),
            self.clock.now(),
        );

        self.with_conn(|conn| {
            upsert(conn, &record)?;
            debug!(key = %record.key(), version = %record.version_tag, "Content cached");
            Ok(())
        })?;

        Ok(record)
    }

    /// Store a revalidated record unless a newer write got there first
    ///
    /// `served_version` is the tag the revalidation started from. The write
    /// happens when the row is gone, or still holds `served_version`, or
    /// holds an older `last_modified` than `data`. A row that already holds
    /// the fetched tag is reported as [`RevalidatedWrite::AlreadyCurrent`],
    /// since a concurrent revalidation stored the same revision.
    pub fn put_if_newer(
        &self,
        country_slug: &str,
        content_path: &str,
        data: &ContentData,
        served_version: &str,
    ) -> Result<RevalidatedWrite, ContentError> {
        let key = cache_key(country_slug, content_path);
        let record = ContentRecord::from_data(
            country_slug,
            content_path,
            data.clone(),
            self.clock.now(),
        );

        self.with_conn(|conn| {
            let tx = conn.transaction().context("Failed to begin transaction")?;

            let current = tx
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM content WHERE key = ?"),
                    params![key],
                    record_from_row,
                )
                .optional()
                .context("Failed to query current version")?;

            let should_write = match &current {
                None => true,
                Some(stored) if stored.version_tag == data.version_tag => {
                    debug!(key = %key, version = %stored.version_tag, "Revalidated content already cached");
                    return Ok(RevalidatedWrite::AlreadyCurrent(stored.clone()));
                }
                Some(stored) if stored.version_tag == served_version => true,
                Some(stored) => {
                    data.last_modified.timestamp_millis() > stored.last_modified.timestamp_millis()
                }
            };

            if !should_write {
                debug!(
                    key = %key,
                    fresh = %data.version_tag,
                    current = ?current.as_ref().map(|stored| &stored.version_tag),
                    "Skipping stale revalidation write"
                );
                return Ok(RevalidatedWrite::Stale);
            }

            upsert(&tx, &record)?;
            tx.commit().context("Failed to commit revalidation write")?;

            debug!(key = %key, version = %record.version_tag, "Revalidated content cached");
            Ok(RevalidatedWrite::Written(record.clone()))
        })
    }

    /// Delete one record, or every record of a country when `content_path`
    /// is `None`. Returns the number of rows removed.
    pub fn invalidate(
        &self,
        country_slug: &str,
        content_path: Option<&str>,
    ) -> Result<usize, ContentError> {
        self.with_conn(|conn| {
            let removed = match content_path {
                Some(path) => conn
                    .execute(
                        "DELETE FROM content WHERE key = ?",
                        params![cache_key(country_slug, path)],
                    )
                    .context("Failed to delete cache entry")?,
                None => conn
                    .execute(
                        "DELETE FROM content WHERE country_slug = ?",
                        params![country_slug],
                    )
                    .context("Failed to delete country entries")?,
            };

            debug!(country = %country_slug, path = ?content_path, removed, "Cache invalidated");
            Ok(removed)
        })
    }

    /// Paths currently cached for a country
    pub fn country_paths(&self, country_slug: &str) -> Result<Vec<String>, ContentError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT content_path FROM content WHERE country_slug = ? ORDER BY content_path")
                .context("Failed to prepare query")?;

            let rows = stmt
                .query_map(params![country_slug], |row| row.get::<_, String>(0))
                .context("Failed to query country paths")?;

            let mut paths = Vec::new();
            for row in rows {
                paths.push(row.context("Failed to read row")?);
            }
            Ok(paths)
        })
    }

    /// Get cache statistics
    ///
    /// The byte size is the serialized JSON length of every record, an
    /// estimate rather than the on-disk footprint.
    pub fn stats(&self) -> Result<CacheStats, ContentError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {SELECT_COLUMNS} FROM content"))
                .context("Failed to prepare query")?;

            let rows = stmt
                .query_map([], record_from_row)
                .context("Failed to scan cache")?;

            let mut stats = CacheStats::default();
            let mut countries = std::collections::BTreeSet::new();
            for row in rows {
                let record = row.context("Failed to read row")?;
                stats.count += 1;
                stats.approximate_bytes += serde_json::to_vec(&record)
                    .map(|bytes| bytes.len())
                    .unwrap_or(record.body.len());
                countries.insert(record.country_slug);
            }
            stats.country_count = countries.len();

            Ok(stats)
        })
    }

    /// Clear all cache entries
    pub fn clear(&self) -> Result<usize, ContentError> {
        self.with_conn(|conn| {
            let removed = conn
                .execute("DELETE FROM content", [])
                .context("Failed to clear cache")?;
            debug!(removed, "Cache cleared");
            Ok(removed)
        })
    }

    /// Vacuum database to reclaim space
    pub fn vacuum(&self) -> Result<(), ContentError> {
        self.with_conn(|conn| {
            conn.execute("VACUUM", []).context("Failed to vacuum")?;
            debug!("Database vacuumed");
            Ok(())
        })
    }

    fn with_conn<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> anyhow::Result<T>,
    ) -> Result<T, ContentError> {
        let mut conn = self.conn.lock();
        op(&mut conn).map_err(|e| ContentError::storage(format!("{e:#}")))
    }
}

impl Drop for ContentCache {
    fn drop(&mut self) {
        // Flush the WAL into the main file so it doesn't grow across restarts
        let conn = self.conn.lock();
        if let Err(e) = conn.pragma_update(None, "wal_checkpoint", "TRUNCATE") {
            warn!("Failed to checkpoint WAL on ContentCache drop: {}", e);
        }
    }
}

/// Outcome of [`ContentCache::put_if_newer`]
#[derive(Debug, Clone, PartialEq)]
pub enum RevalidatedWrite {
    /// The fetched record was stored
    Written(ContentRecord),
    /// The row already held the fetched revision
    AlreadyCurrent(ContentRecord),
    /// A newer revision is cached; nothing was written
    Stale,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub count: usize,
    pub approximate_bytes: usize,
    pub country_count: usize,
}

fn init_database(cache_dir: &Path, cache_path: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(cache_dir).with_context(|| {
        format!("Failed to create cache directory: {}", cache_dir.display())
    })?;

    let conn = Connection::open(cache_path)
        .with_context(|| format!("Failed to open cache database: {}", cache_path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .context("Failed to enable WAL mode")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS cache_metadata (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS content (
            key TEXT PRIMARY KEY,
            country_slug TEXT NOT NULL,
            content_path TEXT NOT NULL,
            body TEXT NOT NULL,
            version_tag TEXT NOT NULL,
            last_modified INTEGER NOT NULL,
            cached_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_country ON content(country_slug);
        "#,
    )
    .context("Failed to create schema")?;

    let stored_version: Option<i32> = conn
        .query_row(
            "SELECT value FROM cache_metadata WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to query cache version")?;

    match stored_version {
        Some(v) if v == CACHE_VERSION => {
            debug!("Cache version {} matches current", CACHE_VERSION);
        }
        Some(v) => {
            warn!(
                stored = v,
                current = CACHE_VERSION,
                "Cache version mismatch detected, clearing stale cache"
            );
            conn.execute("DELETE FROM content", [])
                .context("Failed to clear stale cache")?;
            conn.execute(
                "INSERT OR REPLACE INTO cache_metadata (key, value) VALUES ('version', ?)",
                params![CACHE_VERSION],
            )
            .context("Failed to update cache version")?;
        }
        None => {
            conn.execute(
                "INSERT INTO cache_metadata (key, value) VALUES ('version', ?)",
                params![CACHE_VERSION],
            )
            .context("Failed to initialize cache version")?;
            debug!("Cache version initialized to {}", CACHE_VERSION);
        }
    }

    Ok(conn)
}

fn upsert(conn: &Connection, record: &ContentRecord) -> anyhow::Result<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO content
        (key, country_slug, content_path, body, version_tag, last_modified, cached_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            record.key(),
            record.country_slug,
            record.content_path,
            record.body,
            record.version_tag,
            record.last_modified.timestamp_millis(),
            record.cached_at.timestamp_millis(),
        ],
    )
    .context("Failed to write cache entry")?;
    Ok(())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ContentRecord> {
    Ok(ContentRecord {
        country_slug: row.get(0)?,
        content_path: row.get(1)?,
        body: row.get(2)?,
        version_tag: row.get(3)?,
        last_modified: millis_to_datetime(row.get(4)?),
        cached_at: millis_to_datetime(row.get(5)?),
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
