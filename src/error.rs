//! Error types for the Shrnk server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::pipeline::PipelineError;
use crate::session::SessionError;
use crate::transform::TransformError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Coarse classification shared by every component error.
///
/// Only the HTTP layer turns a class into a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any work was attempted
    Input,
    /// Corrupt archive, wrong password, undecodable data
    Codec,
    /// Disk or task failure
    Io,
    /// Unknown session, missing output, missing entry
    NotFound,
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unprocessable content: {0}")]
    Unprocessable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    fn classified(class: ErrorClass, message: String) -> Self {
        match class {
            ErrorClass::Input => AppError::BadRequest(message),
            ErrorClass::Codec => AppError::Unprocessable(message),
            ErrorClass::NotFound => AppError::NotFound(message),
            ErrorClass::Io => AppError::Internal(message),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        Self::classified(err.class(), err.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        Self::classified(err.class(), err.to_string())
    }
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        Self::classified(err.class(), err.to_string())
    }
}

impl From<TransformError> for AppError {
    fn from(err: TransformError) -> Self {
        Self::classified(err.class(), err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::BadRequest(format!("Malformed multipart body: {}", err))
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Unprocessable(msg) => {
                tracing::warn!("Codec error: {}", msg);
                (StatusCode::UNPROCESSABLE_ENTITY, "codec_error", msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "IO error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_maps_to_status() {
        let cases = [
            (ErrorClass::Input, StatusCode::BAD_REQUEST),
            (ErrorClass::Codec, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorClass::NotFound, StatusCode::NOT_FOUND),
            (ErrorClass::Io, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (class, expected) in cases {
            let response = AppError::classified(class, "boom".to_string()).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_session_not_found_is_404() {
        let err: AppError = SessionError::NotFound("abc".to_string()).into();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
