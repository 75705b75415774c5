//! Stale-while-revalidate content loader
//!
//! A cached, unexpired record is returned straight away and a background
//! task asks the fetcher whether a newer revision exists. A miss fetches
//! synchronously and populates the cache.
//!
//! The background task is explicit: [`Revalidation`] can be awaited for
//! the fresher record or cancelled, and dropping it detaches the task (the
//! cache write still lands, the notification goes nowhere).

use crate::cache::{ContentCache, RevalidatedWrite};
use crate::error::ContentError;
use crate::event::{DataEvent, EventBus};
use crate::fetcher::ContentFetcher;
use crate::record::ContentRecord;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Where a loaded record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Cache,
    Network,
}

/// Result of [`ContentLoader::load_content`]
#[derive(Debug)]
pub struct ContentLoad {
    pub record: ContentRecord,
    pub source: LoadSource,

    /// Present for cache hits only
    pub revalidation: Option<Revalidation>,
}

/// Handle on a background revalidation
#[derive(Debug)]
pub struct Revalidation {
    updates: oneshot::Receiver<ContentRecord>,
    task: JoinHandle<()>,
}

impl Revalidation {
    /// Wait for the background check to settle
    ///
    /// Returns the fresher record when the fetched revision differs from
    /// the served one and is what the cache now holds. `None` when the
    /// content was unchanged or the fetch failed. Also `None` when a newer
    /// write already landed or the task was cancelled.
    pub async fn updated(self) -> Option<ContentRecord> {
        self.updates.await.ok()
    }

    /// Abort the background fetch; no cache write happens afterwards
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Cache-first content loader
pub struct ContentLoader<F: ContentFetcher> {
    /// `None` runs without a cache (every load goes to the network)
    cache: Option<Arc<ContentCache>>,
    fetcher: Arc<F>,
    events: EventBus,
}

impl<F: ContentFetcher> Clone for ContentLoader<F> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            fetcher: Arc::clone(&self.fetcher),
            events: self.events.clone(),
        }
    }
}

impl<F: ContentFetcher> ContentLoader<F> {
    pub fn new(cache: Option<Arc<ContentCache>>, fetcher: Arc<F>) -> Self {
        Self {
            cache,
            fetcher,
            events: EventBus::default_capacity(),
        }
    }

    /// Publish updates on a shared bus instead of a private one
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn cache(&self) -> Option<&Arc<ContentCache>> {
        self.cache.as_ref()
    }

    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    /// Load `country/path`, cache first
    ///
    /// Cache failures count as misses. Fetch failures on a miss are
    /// reported as `LoadFailed` and leave the cache untouched.
    pub async fn load_content(
        &self,
        country: &str,
        path: &str,
    ) -> Result<ContentLoad, ContentError> {
        if let Some(record) = self.cached(country, path) {
            let revalidation = self.spawn_revalidation(record.clone());
            return Ok(ContentLoad {
                record,
                source: LoadSource::Cache,
                revalidation: Some(revalidation),
            });
        }

        let data = self.fetcher.fetch(country, path).await.map_err(|e| {
            debug!(country, path, error = %e, "Content load failed");
            ContentError::LoadFailed {
                country: country.to_string(),
                path: path.to_string(),
                source: Box::new(e),
            }
        })?;

        let record = match &self.cache {
            Some(cache) => match cache.put(country, path, &data) {
                Ok(record) => record,
                Err(e) => {
                    warn!(country, path, error = %e, "Failed to cache content");
                    ContentRecord::from_data(country, path, data, Utc::now())
                }
            },
            None => ContentRecord::from_data(country, path, data, Utc::now()),
        };

        Ok(ContentLoad {
            record,
            source: LoadSource::Network,
            revalidation: None,
        })
    }

    /// Drop cached content after an edit and tell subscribers
    pub fn invalidate(&self, country: &str, path: Option<&str>) -> Result<usize, ContentError> {
        let removed = match &self.cache {
            Some(cache) => cache.invalidate(country, path)?,
            None => 0,
        };

        self.events.publish(DataEvent::ContentInvalidated {
            country: country.to_string(),
            path: path.map(str::to_string),
        });

        Ok(removed)
    }

    /// Empty the whole cache
    pub fn clear_cache(&self) -> Result<usize, ContentError> {
        let removed = match &self.cache {
            Some(cache) => cache.clear()?,
            None => 0,
        };
        self.events.publish(DataEvent::CacheCleared);
        Ok(removed)
    }

    fn cached(&self, country: &str, path: &str) -> Option<ContentRecord> {
        let cache = self.cache.as_ref()?;
        match cache.get(country, path) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(country, path, error = %e, "Content cache unavailable, treating as miss");
                None
            }
        }
    }

    fn spawn_revalidation(&self, served: ContentRecord) -> Revalidation {
        let (tx, rx) = oneshot::channel();
        let cache = self.cache.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            let country = served.country_slug.as_str();
            let path = served.content_path.as_str();

            let fresh = match fetcher
                .fetch_if_changed(country, path, &served.version_tag)
                .await
            {
                Ok(Some(fresh)) => fresh,
                Ok(None) => {
                    debug!(country, path, version = %served.version_tag, "Cached content is current");
                    return;
                }
                Err(e) => {
                    debug!(country, path, error = %e, "Background revalidation failed");
                    return;
                }
            };

            let updated = match &cache {
                Some(cache) => match cache.put_if_newer(country, path, &fresh, &served.version_tag) {
                    // A concurrent check may have stored the same revision first;
                    // this caller still shows the served one and needs it
                    Ok(RevalidatedWrite::Written(stored))
                    | Ok(RevalidatedWrite::AlreadyCurrent(stored)) => stored,
                    Ok(RevalidatedWrite::Stale) => return,
                    Err(e) => {
                        warn!(country, path, error = %e, "Failed to cache revalidated content");
                        ContentRecord::from_data(country, path, fresh, Utc::now())
                    }
                },
                None => ContentRecord::from_data(country, path, fresh, Utc::now()),
            };

            debug!(
                country,
                path,
                old = %served.version_tag,
                new = %updated.version_tag,
                "Content revalidated"
            );

            events.publish(DataEvent::ContentUpdated {
                country: updated.country_slug.clone(),
                path: updated.content_path.clone(),
                version_tag: updated.version_tag.clone(),
            });

            // Receiver gone means nobody is looking any more
            let _ = tx.send(updated);
        });

        Revalidation { updates: rx, task }
    }
}
