//! Unauthenticated read routes

use axum::{
    extract::{Path, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, IF_NONE_MATCH, LAST_MODIFIED},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use guidebook_core::fetcher::format_http_date;
use tracing::debug;

use super::{content_key, NO_CACHE, PDF_MIME};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::StorageError;

pub async fn list_countries(State(state): State<AppState>) -> impl IntoResponse {
    let countries = state.index.list().await;
    ([(CACHE_CONTROL, NO_CACHE)], Json(Vec::clone(&countries)))
}

pub async fn get_country(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let country = state
        .index
        .get(&slug)
        .await
        .ok_or(ApiError::NotFound("Country not found"))?;
    Ok(([(CACHE_CONTROL, NO_CACHE)], Json(country)).into_response())
}

/// Markdown body with `ETag` / `Last-Modified`; honors `If-None-Match`
pub async fn get_content(
    State(state): State<AppState>,
    Path((country, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let key = content_key(&country, &path);

    let meta = state
        .store
        .metadata(&key)
        .await
        .map_err(|e| read_error(e, "Content not found", "Failed to fetch content"))?;

    let client_etag = headers.get(IF_NONE_MATCH).and_then(|v| v.to_str().ok());
    if client_etag == Some(meta.etag.as_str()) {
        debug!(%key, "Content not modified");
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let bytes = state
        .store
        .read(&key)
        .await
        .map_err(|e| read_error(e, "Content not found", "Failed to fetch content"))?;

    Ok((
        [
            (CONTENT_TYPE, "text/markdown".to_string()),
            (ETAG, meta.etag),
            (LAST_MODIFIED, format_http_date(meta.updated)),
            (CACHE_CONTROL, NO_CACHE.to_string()),
        ],
        String::from_utf8_lossy(&bytes).into_owned(),
    )
        .into_response())
}

pub async fn get_pdf(
    State(state): State<AppState>,
    Path((country, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let key = content_key(&country, &path);

    let meta = state
        .store
        .metadata(&key)
        .await
        .map_err(|e| read_error(e, "PDF not found", "Failed to serve PDF"))?;
    let bytes = state
        .store
        .read(&key)
        .await
        .map_err(|e| read_error(e, "PDF not found", "Failed to serve PDF"))?;

    let file_name = path.rsplit('/').next().unwrap_or(&path).replace('"', "");
    Ok((
        [
            (CONTENT_TYPE, PDF_MIME.to_string()),
            (CONTENT_DISPOSITION, format!("inline; filename=\"{file_name}\"")),
            (ETAG, meta.etag),
            (CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// `HEAD /pdf/...`: 200 when the blob exists, 404 otherwise, never a body
pub async fn head_pdf(
    State(state): State<AppState>,
    Path((country, path)): Path<(String, String)>,
) -> StatusCode {
    match state.store.exists(&content_key(&country, &path)).await {
        Ok(true) => StatusCode::OK,
        Ok(false) | Err(StorageError::InvalidKey { .. }) => StatusCode::NOT_FOUND,
        Err(e) => {
            tracing::error!(error = %e, "Failed to check PDF");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Missing blobs and unaddressable keys both read as "not found"
fn read_error(err: StorageError, not_found: &'static str, failure: &'static str) -> ApiError {
    match err {
        StorageError::NotFound { .. } | StorageError::InvalidKey { .. } => {
            ApiError::NotFound(not_found)
        }
        other => ApiError::internal(failure, other),
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
