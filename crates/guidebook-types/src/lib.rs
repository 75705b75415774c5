//! guidebook-types - Shared data types for guidebook
//!
//! This crate contains pure data structures without heavy dependencies.
//! No tokio, no async runtime - just serde-serializable types.
//!
//! Used by:
//! - guidebook-core (client cache, loader, API client)
//! - guidebook-server (backend HTTP API)
//! - guidebook (CLI)

pub mod api;
pub mod models;

// Re-export wire types
pub use api::{ErrorBody, LoginRequest, LoginResponse, SaveContentResponse, UploadResponse};

// Re-export model types
pub use models::{
    slugify, ColorPalette, ContentData, ContentType, Country, CountryPatch, MenuItem,
    MenuItemKind, NewCountry,
};
