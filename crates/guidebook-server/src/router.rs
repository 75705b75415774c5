//! HTTP router using Axum

use axum::{
    extract::{DefaultBodyLimit, State},
    http::header::{ETAG, LAST_MODIFIED},
    middleware,
    response::sse::{Event, Sse},
    routing::{get, post, put},
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_admin;
use crate::routes::{admin, public};
use crate::sse;
use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([ETAG, LAST_MODIFIED]);

    let protected = Router::new()
        .route("/admin/countries", post(admin::create_country))
        .route(
            "/admin/countries/{slug}",
            put(admin::update_country).delete(admin::delete_country),
        )
        .route(
            "/admin/content/{country}/{*path}",
            put(admin::save_content).delete(admin::delete_content),
        )
        .route(
            "/admin/upload/{country}/{*path}",
            post(admin::upload_pdf).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(public::health))
        .route("/events", get(sse_handler))
        .route("/countries", get(public::list_countries))
        .route("/countries/{slug}", get(public::get_country))
        .route("/content/{country}/{*path}", get(public::get_content))
        .route(
            "/pdf/{country}/{*path}",
            get(public::get_pdf).head(public::head_pdf),
        )
        .route("/admin/login", post(admin::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// SSE endpoint for live updates
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse::create_sse_stream(state.events.clone())
}
