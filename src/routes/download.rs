//! Download of session results

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// `?path=<relative>` selects a file under `output/`
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub path: Option<String>,
}

/// Stream a file from the session's output directory
///
/// Without `path`, the first regular file of `output/` is served.
pub async fn download(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    let sessions = state.sessions();
    let session = sessions.open_session(&session_id).await?;

    let file_path = match query.path.as_deref().filter(|p| !p.is_empty()) {
        Some(relative) => sessions.resolve_output(session, relative).await?,
        None => sessions.first_output_file(session).await?,
    };

    let file = tokio::fs::File::open(&file_path).await?;
    let size = file.metadata().await?.len();

    let filename = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    let content_type = mime_guess::from_path(&file_path).first_or_octet_stream();

    tracing::info!(session_id = %session, file = %filename, bytes = size, "Serving download");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_DISPOSITION, attachment(&filename))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name
fn attachment(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            ' ' => c,
            c if c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}
