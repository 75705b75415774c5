//! Content fetcher interface
//!
//! The loader only needs "give me the current revision of this path"; the
//! HTTP implementation lives in [`crate::client::ApiClient`].

use crate::error::ContentError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use guidebook_types::ContentData;

#[async_trait]
pub trait ContentFetcher: Send + Sync + 'static {
    /// Fetch the current revision of `country/path`
    ///
    /// Fails with `ContentNotFound` when the backend has no such content,
    /// and with a transient error for anything else.
    async fn fetch(&self, country: &str, path: &str) -> Result<ContentData, ContentError>;

    /// Fetch only if the current revision differs from `known_version`
    ///
    /// The default fetches the full body and compares tags; HTTP
    /// implementations can use a conditional request instead.
    async fn fetch_if_changed(
        &self,
        country: &str,
        path: &str,
        known_version: &str,
    ) -> Result<Option<ContentData>, ContentError> {
        let fresh = self.fetch(country, path).await?;
        Ok((fresh.version_tag != known_version).then_some(fresh))
    }
}

/// Parse a `Last-Modified` value (HTTP date or RFC 3339); `None` when absent or invalid
pub fn parse_last_modified(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Format a timestamp as an HTTP date (`Tue, 15 Nov 1994 08:12:31 GMT`)
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
