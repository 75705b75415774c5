//! Event bus for guidebook using tokio::broadcast
//!
//! Provides a publish-subscribe mechanism for content and country changes.

use tokio::sync::broadcast;

/// Events emitted when content or countries change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEvent {
    /// A fresher revision replaced a cached or stored body
    ContentUpdated {
        country: String,
        path: String,
        version_tag: String,
    },
    /// Content was removed (a single path, or a whole country when `path` is `None`)
    ContentInvalidated {
        country: String,
        path: Option<String>,
    },
    /// A country was created or edited
    CountryChanged(String),
    /// A country and all of its content were deleted
    CountryDeleted(String),
    /// The whole local cache was emptied
    CacheCleared,
}

impl DataEvent {
    /// Event name used on the SSE wire
    pub fn name(&self) -> &'static str {
        match self {
            DataEvent::ContentUpdated { .. } => "content_updated",
            DataEvent::ContentInvalidated { .. } => "content_invalidated",
            DataEvent::CountryChanged(_) => "country_changed",
            DataEvent::CountryDeleted(_) => "country_deleted",
            DataEvent::CacheCleared => "cache_cleared",
        }
    }

    /// Country the event concerns, if any
    pub fn country(&self) -> Option<&str> {
        match self {
            DataEvent::ContentUpdated { country, .. }
            | DataEvent::ContentInvalidated { country, .. } => Some(country),
            DataEvent::CountryChanged(slug) | DataEvent::CountryDeleted(slug) => Some(slug),
            DataEvent::CacheCleared => None,
        }
    }
}

/// Event bus for broadcasting data events
///
/// The loader publishes revalidation results here; the server reuses it
/// for its SSE change feed.
pub struct EventBus {
    sender: broadcast::Sender<DataEvent>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (256 events)
    pub fn default_capacity() -> Self {
        Self::new(256)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: DataEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
