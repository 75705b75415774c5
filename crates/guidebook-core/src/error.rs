//! Error types for guidebook-core
//!
//! One taxonomy for the whole client side: the loader, the cache and the
//! API client all report through [`ContentError`], and [`ErrorClass`]
//! tells callers whether a failure is worth a manual retry.

use thiserror::Error;

/// Core error type for guidebook client operations
#[derive(Error, Debug)]
pub enum ContentError {
    // ===================
    // Resource Errors
    // ===================
    #[error("Content not found: {country}/{path}")]
    ContentNotFound { country: String, path: String },

    #[error("Country not found: {slug}")]
    CountryNotFound { slug: String },

    // ===================
    // Transport Errors
    // ===================
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Unexpected response ({status}): {message}")]
    UnexpectedStatus { status: u16, message: String },

    // ===================
    // Cache Errors
    // ===================
    #[error("Content cache unavailable: {message}")]
    StorageUnavailable { message: String },

    // ===================
    // Auth Errors
    // ===================
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    // ===================
    // Loader Errors
    // ===================
    #[error("Failed to load {country}/{path}: {source}")]
    LoadFailed {
        country: String,
        path: String,
        #[source]
        source: Box<ContentError>,
    },

    // ===================
    // Config Errors
    // ===================
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// How a failure should be treated by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Resource is absent; retrying will not help until an editor acts
    Permanent,
    /// Network or storage hiccup; a manual retry may succeed
    Transient,
    /// Credentials missing or rejected; surface immediately, no retry
    Auth,
}

impl ContentError {
    pub fn network(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Classify this error, looking through `LoadFailed` wrappers
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ContentNotFound { .. } | Self::CountryNotFound { .. } => ErrorClass::Permanent,
            Self::Unauthorized | Self::InvalidCredentials => ErrorClass::Auth,
            Self::LoadFailed { source, .. } => source.class(),
            Self::InvalidConfig { .. } => ErrorClass::Permanent,
            Self::Network { .. } | Self::UnexpectedStatus { .. } | Self::StorageUnavailable { .. } => {
                ErrorClass::Transient
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ContentNotFound { .. } | Self::CountryNotFound { .. } => true,
            Self::LoadFailed { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Message suitable for an error panel with a retry action
    pub fn user_message(&self) -> String {
        match self {
            Self::LoadFailed { source, .. } if source.is_not_found() => {
                "This page has no content yet.".to_string()
            }
            Self::LoadFailed { .. } => "Failed to load content".to_string(),
            Self::Unauthorized => "Your admin session has expired. Please log in again.".to_string(),
            Self::InvalidCredentials => "Invalid password".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_failed_classification() {
        let err = ContentError::LoadFailed {
            country: "italy".to_string(),
            path: "rome.md".to_string(),
            source: Box::new(ContentError::ContentNotFound {
                country: "italy".to_string(),
                path: "rome.md".to_string(),
            }),
        };

        assert!(err.is_not_found());
        assert_eq!(err.class(), ErrorClass::Permanent);
        assert_eq!(err.user_message(), "This page has no content yet.");
    }

    #[test]
    fn test_transient_and_auth_classes() {
        assert_eq!(ContentError::storage("disk full").class(), ErrorClass::Transient);
        assert_eq!(ContentError::Unauthorized.class(), ErrorClass::Auth);
        assert!(!ContentError::InvalidCredentials.is_not_found());
    }
}
