//! Bearer authentication for `/admin` routes

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Reject requests whose `Authorization: Bearer` secret is missing or wrong
///
/// Layered with `middleware::from_fn_with_state` over the privileged routes.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if !state.check_password(token) {
        warn!(path = %request.uri().path(), "Rejected admin request with invalid credentials");
        return Err(ApiError::InvalidCredentials);
    }

    Ok(next.run(request).await)
}
