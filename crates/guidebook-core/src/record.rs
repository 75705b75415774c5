//! Cached content records

use chrono::{DateTime, Utc};
use guidebook_types::ContentData;
use serde::{Deserialize, Serialize};

/// A content body as held by the local cache
///
/// Identity is `(country_slug, content_path)`. The cache owns the stored
/// row; everything handed out is a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub country_slug: String,
    pub content_path: String,
    pub body: String,
    pub version_tag: String,
    pub last_modified: DateTime<Utc>,
    pub cached_at: DateTime<Utc>,
}

impl ContentRecord {
    pub fn from_data(
        country_slug: impl Into<String>,
        content_path: impl Into<String>,
        data: ContentData,
        cached_at: DateTime<Utc>,
    ) -> Self {
        Self {
            country_slug: country_slug.into(),
            content_path: content_path.into(),
            body: data.body,
            version_tag: data.version_tag,
            last_modified: data.last_modified,
            cached_at,
        }
    }

    pub fn key(&self) -> String {
        cache_key(&self.country_slug, &self.content_path)
    }

    pub fn data(&self) -> ContentData {
        ContentData {
            body: self.body.clone(),
            version_tag: self.version_tag.clone(),
            last_modified: self.last_modified,
        }
    }
}

/// Composite cache key: `country/path`
pub fn cache_key(country_slug: &str, content_path: &str) -> String {
    format!("{country_slug}/{content_path}")
}
