//! Image routes
//!
//! Endpoints:
//! - POST /api/image/resize - Resize (and optionally strip) uploaded images
//! - POST /api/image/strip-metadata - Strip metadata from uploaded images
//! - GET /api/image/download/:session_id - Download from the session output
//! - GET /api/image/progress/:session_id - Server-sent progress events

use axum::{
    extract::{Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::error::Result;
use crate::pipeline::ImageOutcome;
use crate::state::AppState;
use crate::transform::{ResizeSpec, TransformOptions};

use super::download::download;
use super::multipart::{or_abort, read_form, SessionQuery};
use super::progress::progress_events;

/// Create the image router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/resize", post(resize))
        .route("/strip-metadata", post(strip_metadata))
        .route("/download/:session_id", get(download))
        .route("/progress/:session_id", get(progress_events))
}

async fn resize(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    mut multipart: Multipart,
) -> Result<Json<ImageOutcome>> {
    let pipeline = state.pipeline();
    let session = pipeline.sessions().open_or_create(query.session.as_deref()).await?;

    let form = or_abort(
        pipeline,
        session,
        read_form(pipeline.sessions(), session, &mut multipart, &["files", "file"]).await,
    )?;
    let resize = or_abort(
        pipeline,
        session,
        ResizeSpec::parse(form.text("resizeOption").unwrap_or("")),
    )?;
    let options = TransformOptions {
        resize,
        strip_metadata: form.flag("stripMetadata"),
    };

    tracing::info!(
        session_id = %session,
        files = form.files.len(),
        resize = ?options.resize,
        strip_metadata = options.strip_metadata,
        "Resize requested"
    );

    Ok(Json(pipeline.resize_images(session, form.files, options).await?))
}

async fn strip_metadata(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    mut multipart: Multipart,
) -> Result<Json<ImageOutcome>> {
    let pipeline = state.pipeline();
    let session = pipeline.sessions().open_or_create(query.session.as_deref()).await?;

    let form = or_abort(
        pipeline,
        session,
        read_form(pipeline.sessions(), session, &mut multipart, &["files", "file"]).await,
    )?;

    tracing::info!(session_id = %session, files = form.files.len(), "Metadata strip requested");

    Ok(Json(pipeline.strip_metadata(session, form.files).await?))
}
