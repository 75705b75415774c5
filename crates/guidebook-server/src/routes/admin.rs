//! Admin routes: login, country management, content and PDF writes
//!
//! Everything except `login` sits behind [`crate::auth::require_admin`].

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use guidebook_core::DataEvent;
use guidebook_types::{
    CountryPatch, LoginRequest, LoginResponse, NewCountry, SaveContentResponse, UploadResponse,
};
use tracing::{debug, info};

use super::{content_key, DOCX_MIME, PDF_MIME};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::StorageError;

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if !state.check_password(&request.password) {
        return Err(ApiError::InvalidPassword);
    }
    info!("Admin login succeeded");
    Ok(Json(LoginResponse { success: true }))
}

pub async fn create_country(
    State(state): State<AppState>,
    Json(new): Json<NewCountry>,
) -> Result<Response, ApiError> {
    let country = state.index.create(new).await?;
    state
        .events
        .publish(DataEvent::CountryChanged(country.slug.clone()));
    Ok((StatusCode::CREATED, Json(country)).into_response())
}

pub async fn update_country(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(patch): Json<CountryPatch>,
) -> Result<Response, ApiError> {
    let country = state.index.update(&slug, patch).await?;
    if country.slug != slug {
        state.events.publish(DataEvent::CountryDeleted(slug));
    }
    state
        .events
        .publish(DataEvent::CountryChanged(country.slug.clone()));
    Ok(Json(country).into_response())
}

/// Remove the country and every blob stored under `{slug}/`
pub async fn delete_country(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.index.delete(&slug).await?;

    let removed = state
        .store
        .delete_prefix(&format!("{slug}/"))
        .await
        .map_err(|e| ApiError::internal("Failed to delete country", e))?;
    debug!(%slug, removed, "Country blobs removed");

    state.events.publish(DataEvent::CountryDeleted(slug));
    Ok(StatusCode::NO_CONTENT)
}

/// Store the request body as the markdown at `{country}/{path}`
pub async fn save_content(
    State(state): State<AppState>,
    Path((country, path)): Path<(String, String)>,
    body: String,
) -> Result<Json<SaveContentResponse>, ApiError> {
    let meta = state
        .store
        .write(&content_key(&country, &path), body.into_bytes(), "text/markdown")
        .await
        .map_err(|e| write_error(e, "Failed to save content"))?;

    info!(%country, %path, etag = %meta.etag, "Content saved");
    state.events.publish(DataEvent::ContentUpdated {
        country,
        path,
        version_tag: meta.etag,
    });

    Ok(Json(SaveContentResponse {
        success: true,
        timestamp: Utc::now().timestamp_millis(),
    }))
}

pub async fn delete_content(
    State(state): State<AppState>,
    Path((country, path)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    match state.store.delete(&content_key(&country, &path)).await {
        Ok(()) => {}
        Err(StorageError::NotFound { .. }) => return Err(ApiError::NotFound("Content not found")),
        Err(e) => return Err(write_error(e, "Failed to delete content")),
    }

    info!(%country, %path, "Content deleted");
    state.events.publish(DataEvent::ContentInvalidated {
        country,
        path: Some(path),
    });
    Ok(StatusCode::NO_CONTENT)
}

/// Accept a PDF in multipart field `file` and store it under a `.pdf` key
pub async fn upload_pdf(
    State(state): State<AppState>,
    Path((country, path)): Path<(String, String)>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart
        .map_err(|_| ApiError::bad_request("Content-Type must be multipart/form-data"))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to parse upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let mime = field.content_type().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse upload: {e}")))?;
        upload = Some((mime, file_name, bytes));
    }

    let (mime, file_name, bytes) = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    match mime.as_str() {
        PDF_MIME => {}
        DOCX_MIME => {
            return Err(ApiError::bad_request(
                "DOCX conversion is not yet implemented. Please upload a PDF file.",
            ))
        }
        _ => return Err(ApiError::bad_request("Only PDF and DOCX files are allowed")),
    }

    let final_path = if path.ends_with(".pdf") {
        path
    } else {
        format!("{path}.pdf")
    };
    let key = content_key(&country, &final_path);

    let meta = state
        .store
        .write(&key, bytes.to_vec(), PDF_MIME)
        .await
        .map_err(|e| write_error(e, "Failed to upload file"))?;

    info!(%key, %file_name, size = meta.size, "PDF uploaded");
    state.events.publish(DataEvent::ContentUpdated {
        country,
        path: final_path,
        version_tag: meta.etag,
    });

    Ok(Json(UploadResponse {
        success: true,
        path: key,
    }))
}

fn write_error(err: StorageError, failure: &'static str) -> ApiError {
    match err {
        StorageError::InvalidKey { .. } => ApiError::bad_request("Invalid content path"),
        other => ApiError::internal(failure, other),
    }
}
