//! Session allocation
//!
//! A client allocates a session first so it can open the progress stream
//! before uploading, then passes `?session=<id>` to the operation.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::session::SessionId;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,

    /// When the retention sweeper may remove the session's files
    pub expires_at: DateTime<Utc>,
}

/// Create the sessions router
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(create_session))
}

async fn create_session(State(state): State<AppState>) -> Result<(StatusCode, Json<SessionCreated>)> {
    let session_id = state.sessions().create_session().await?;
    let created_at = Utc::now();
    let max_age = chrono::Duration::from_std(state.config().janitor.max_age)
        .unwrap_or_else(|_| chrono::Duration::zero());

    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id,
            created_at,
            expires_at: created_at
                .checked_add_signed(max_age)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }),
    ))
}
