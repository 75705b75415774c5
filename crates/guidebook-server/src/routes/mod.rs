//! Route handlers of the backend API

pub mod admin;
pub mod public;

pub(crate) const NO_CACHE: &str = "no-cache, must-revalidate";
pub(crate) const PDF_MIME: &str = "application/pdf";
pub(crate) const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Blob key of a content path within a country
pub(crate) fn content_key(country: &str, path: &str) -> String {
    format!("{country}/{path}")
}
