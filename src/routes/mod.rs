//! Route modules for the Shrnk server

pub mod archive;
pub mod download;
pub mod image;
pub mod multipart;
pub mod progress;
pub mod sessions;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    progress_streams: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        progress_streams: state.progress().active(),
    })
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config().server.max_upload_mb.saturating_mul(1024 * 1024);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/sessions", sessions::router())
        .nest("/api/archive", archive::router())
        .nest("/api/image", image::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
