//! Content bodies as returned by the backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One revision of a content resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentData {
    /// Markdown text (or any text body)
    pub body: String,

    /// Opaque revision identifier (the HTTP `ETag`)
    pub version_tag: String,

    pub last_modified: DateTime<Utc>,
}

impl ContentData {
    pub fn new(
        body: impl Into<String>,
        version_tag: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            body: body.into(),
            version_tag: version_tag.into(),
            last_modified,
        }
    }
}
