//! Session types

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorClass;

// ============================================================================
// Session Identity
// ============================================================================

/// Unique session token
///
/// Generated per API call. Parsing is strict so a session id can never smuggle
/// path separators into the session root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied session id
    ///
    /// Anything that is not a UUID is reported as an unknown session.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| SessionError::NotFound(raw.to_string()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// Staging Layout
// ============================================================================

/// Directories a session may own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StagingKind {
    Input,
    Processed,
    Output,
    Selected,
}

impl StagingKind {
    /// Directory name under the session root
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Processed => "processed",
            Self::Output => "output",
            Self::Selected => "selected",
        }
    }
}

/// An upload materialized under `input/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Sanitized, unique-within-session file name. This is the file's identity.
    pub name: String,

    /// Sanitized name as uploaded, before any `_N` collision suffix
    pub upload_name: String,

    /// Bytes written to disk
    pub size: u64,

    /// Absolute location of the staged bytes
    pub path: PathBuf,
}

// ============================================================================
// Error Types
// ============================================================================

/// Session store error types
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Output not found: {0}")]
    OutputNotFound(String),

    #[error("Path escapes the session output directory: {0}")]
    PathEscape(String),

    #[error("Session already used by another request: {0}")]
    InUse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) | Self::OutputNotFound(_) | Self::PathEscape(_) => {
                ErrorClass::NotFound
            }
            Self::InUse(_) => ErrorClass::Input,
            Self::Io(_) => ErrorClass::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_round_trips_through_display() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_session_id_rejects_path_like_input() {
        let err = SessionId::parse("../etc").unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }
}
