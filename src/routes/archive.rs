//! Archive routes
//!
//! Endpoints:
//! - POST /api/archive/zip - Stage files, optionally transform images, build archive.zip
//! - POST /api/archive/unzip - Extract an uploaded archive into the session output
//! - POST /api/archive/peek - List an uploaded archive's entries
//! - POST /api/archive/extract-selected - Re-package selected entries as selected.zip
//! - GET /api/archive/download/:session_id - Download from the session output
//! - GET /api/archive/progress/:session_id - Server-sent progress events

use axum::{
    extract::{Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::archive::{ArchiveEntry, CompressionPolicy};
use crate::error::Result;
use crate::pipeline::{ExtractOutcome, SelectOutcome, ZipOutcome, ZipRequest};
use crate::state::AppState;
use crate::transform::{ResizeSpec, TransformOptions};

use super::download::download;
use super::multipart::{or_abort, read_form, SessionQuery};
use super::progress::progress_events;

/// Create the archive router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/zip", post(create_zip))
        .route("/unzip", post(unzip))
        .route("/peek", post(peek))
        .route("/extract-selected", post(extract_selected))
        .route("/download/:session_id", get(download))
        .route("/progress/:session_id", get(progress_events))
}

/// Build an archive from uploaded files
async fn create_zip(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    mut multipart: Multipart,
) -> Result<Json<ZipOutcome>> {
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

    let request = ZipRequest {
        password: form.password(),
        options: TransformOptions {
            resize,
            strip_metadata: form.flag("stripMetadata"),
        },
        compression: CompressionPolicy::parse(form.text("compressionLevel")),
        paths: form.paths,
        files: form.files,
    };

    tracing::info!(
        session_id = %session,
        files = request.files.len(),
        resize = ?request.options.resize,
        strip_metadata = request.options.strip_metadata,
        compression = ?request.compression,
        encrypted = request.password.is_some(),
        "Zip requested"
    );

    Ok(Json(pipeline.create_zip(session, request).await?))
}

/// Extract an uploaded archive
async fn unzip(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    mut multipart: Multipart,
) -> Result<Json<ExtractOutcome>> {
    let pipeline = state.pipeline();
    let session = pipeline.sessions().open_or_create(query.session.as_deref()).await?;

    let mut form = or_abort(
        pipeline,
        session,
        read_form(pipeline.sessions(), session, &mut multipart, &["file", "files"]).await,
    )?;
    let archive = or_abort(pipeline, session, form.single_file())?;

    Ok(Json(pipeline.extract_all(session, archive, form.password()).await?))
}

/// List an uploaded archive's entries without extracting
async fn peek(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    mut multipart: Multipart,
) -> Result<Json<Vec<ArchiveEntry>>> {
    let pipeline = state.pipeline();
    let session = pipeline.sessions().open_or_create(query.session.as_deref()).await?;

    let mut form = or_abort(
        pipeline,
        session,
        read_form(pipeline.sessions(), session, &mut multipart, &["file", "files"]).await,
    )?;
    let archive = or_abort(pipeline, session, form.single_file())?;

    let outcome = pipeline.peek(session, archive, form.password()).await?;
    Ok(Json(outcome.entries))
}

/// Extract selected entries and re-package them
async fn extract_selected(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    mut multipart: Multipart,
) -> Result<Json<SelectOutcome>> {
    let pipeline = state.pipeline();
    let session = pipeline.sessions().open_or_create(query.session.as_deref()).await?;

    let mut form = or_abort(
        pipeline,
        session,
        read_form(pipeline.sessions(), session, &mut multipart, &["file", "files"]).await,
    )?;
    let archive = or_abort(pipeline, session, form.single_file())?;
    let password = form.password();

    Ok(Json(
        pipeline
            .extract_selected(session, archive, form.paths, password)
            .await?,
    ))
}
