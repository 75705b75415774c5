//! HTTP error type for the backend API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use guidebook_types::ErrorBody;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Missing or malformed `Authorization` header
    #[error("Unauthorized")]
    Unauthorized,

    /// Bearer secret did not match
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Login attempt with a wrong password
    #[error("Invalid password")]
    InvalidPassword,

    #[error("{0}")]
    NotFound(&'static str),

    /// Logged with its source; only `message` reaches the client
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials | ApiError::InvalidPassword => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal { message, source } = &self {
            error!(error = %source, "{message}");
        }

        let status = self.status();
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidPassword.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::NotFound("Country not found").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::bad_request("No file uploaded").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_hides_source() {
        let err = ApiError::internal("Failed to save content", anyhow::anyhow!("disk full"));
        assert_eq!(err.to_string(), "Failed to save content");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
