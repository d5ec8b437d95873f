//! Progress Channel types

use serde::Serialize;

use crate::session::SessionId;

/// Named SSE event an update is delivered as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Progress,
    Complete,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Complete and error end the subscription
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress)
    }
}

/// One update pushed to a session's subscriber
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub session_id: SessionId,

    /// 0 to 100. Exactly 100 only on the complete event.
    pub percent: f64,

    pub bytes_processed: u64,
    pub total_bytes: u64,

    /// Human-readable remaining time, or `unknown`
    pub eta: String,

    /// Stage tag (`Processing`, `Compressing`, ...), `complete` or `error`
    pub status: String,

    /// File being worked on, or the error message on an error event
    pub current_file: String,

    #[serde(skip)]
    pub kind: EventKind,
}

impl ProgressEvent {
    pub fn complete(session_id: SessionId, bytes_processed: u64, total_bytes: u64) -> Self {
        Self {
            session_id,
            percent: 100.0,
            bytes_processed,
            total_bytes,
            eta: "0s".to_string(),
            status: "complete".to_string(),
            current_file: String::new(),
            kind: EventKind::Complete,
        }
    }

    pub fn error(session_id: SessionId, message: impl Into<String>) -> Self {
        Self {
            session_id,
            percent: 0.0,
            bytes_processed: 0,
            total_bytes: 0,
            eta: String::new(),
            status: "error".to_string(),
            current_file: message.into(),
            kind: EventKind::Error,
        }
    }
}

/// What happened to a published event
///
/// None of these is an error for the producer; they exist so callers and
/// tests can see whether anyone was listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Queued for the subscriber
    Delivered,

    /// Nobody subscribed to this session
    NoSubscriber,

    /// Subscriber's buffer was full; the update was skipped
    Dropped,

    /// Subscriber went away; its registration was torn down
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_camel_case() {
        let id = SessionId::new();
        let event = ProgressEvent::complete(id, 10, 10);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["sessionId"], id.to_string());
        assert_eq!(json["percent"], 100.0);
        assert_eq!(json["bytesProcessed"], 10);
        assert_eq!(json["status"], "complete");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_error_event_carries_message() {
        let event = ProgressEvent::error(SessionId::new(), "disk full");
        assert_eq!(event.status, "error");
        assert_eq!(event.current_file, "disk full");
        assert!(event.kind.is_terminal());
        assert_eq!(event.kind.as_str(), "error");
    }
}
