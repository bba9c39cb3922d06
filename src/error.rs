//! Errors shared by services and HTTP handlers.
//!
//! Every variant maps to one JSON error response.

use actix_web::{HttpResponse, ResponseError};
use std::fmt;

/// Application-level errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request conflicts with the current state of the resource
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Object storage could not be reached or configured
    #[error("Storage error: {0}")]
    Storage(String),

    /// A signed URL could not be issued for an artifact
    #[error("Failed to resolve artifact '{path}': {message}")]
    ArtifactResolutionFailed { path: String, message: String },

    /// A remote file could not be downloaded
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Downloaded content could not be parsed
    #[error("Parse failed: {0}")]
    ParseFailed(String),

    /// The test matrix reached a terminal error state
    #[error("Test matrix failed: {state}({details})")]
    UpstreamState { state: String, details: String },

    /// A remote call failed after its retry
    #[error("Upstream request failed: {0}")]
    TransientUpstream(String),

    /// Posting a step result to the CI system failed
    #[error("Failed to publish step result: {0}")]
    QueuePublishFailed(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for an artifact resolution failure.
    pub fn artifact(path: impl Into<String>, message: impl fmt::Display) -> Self {
        AppError::ArtifactResolutionFailed {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_code, response_message) = match self {
            AppError::Database(err_str) => {
                tracing::error!("Database error: {}", err_str);
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            AppError::NotFound(_) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                self.to_string(),
            ),
            AppError::InvalidInput(_) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                self.to_string(),
            ),
            AppError::Conflict(_) => (
                actix_web::http::StatusCode::FORBIDDEN,
                "CONFLICT",
                self.to_string(),
            ),
            AppError::Storage(_) | AppError::ArtifactResolutionFailed { .. } => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                self.to_string(),
            ),
            AppError::DownloadFailed(_) | AppError::ParseFailed(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "REPORT_ERROR",
                self.to_string(),
            ),
            AppError::UpstreamState { .. } => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "TEST_MATRIX_FAILED",
                self.to_string(),
            ),
            AppError::TransientUpstream(_) => (
                actix_web::http::StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "Failed to get test status".to_string(),
            ),
            AppError::QueuePublishFailed(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "PUBLISH_ERROR",
                self.to_string(),
            ),
            AppError::Internal(err_str) => {
                tracing::error!("Internal error: {}", err_str);
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal error".to_string(),
                )
            }
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: error_code.to_string(),
            message: response_message,
        })
    }
}

/// Error response body.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("Invalid UUID: {}", err))
    }
}

impl From<quick_xml::Error> for AppError {
    fn from(err: quick_xml::Error) -> Self {
        AppError::ParseFailed(format!("XML error: {}", err))
    }
}

impl From<quick_xml::DeError> for AppError {
    fn from(err: quick_xml::DeError) -> Self {
        AppError::ParseFailed(format!("XML error: {}", err))
    }
}
