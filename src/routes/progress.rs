//! Server-sent progress events

use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};

use crate::error::Result;
use crate::state::AppState;

const SSE_KEEP_ALIVE_SECS: u64 = 15;

/// Subscribe to a session's progress
///
/// Events are named `progress`, `complete` or `error`; the stream ends after
/// a terminal event. Subscribing again replaces the earlier stream.
pub async fn progress_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let session = state.sessions().open_session(&session_id).await?;

    tracing::info!(session_id = %session, "Progress stream opened");

    let stream = state
        .progress()
        .subscribe(session)
        .map(|event| Event::default().event(event.kind.as_str()).json_data(&event));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    ))
}
