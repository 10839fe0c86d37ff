//! Error handling module for the status board.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const IO_ERROR: &str = "IO_ERROR";
    pub const SNAPSHOT_FORMAT_ERROR: &str = "SNAPSHOT_FORMAT_ERROR";
    pub const CATALOG_LOAD_ERROR: &str = "CATALOG_LOAD_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
}

/// Application error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed notice front matter or body split
    Parse { record: String, message: String },
    /// Unreadable source
    Io { record: String, message: String },
    /// Monitoring snapshot is not the expected JSON document
    SnapshotFormat(String),
    /// Service/category definition could not be loaded or validated
    CatalogLoad(String),
    /// Source I/O exceeded the configured bound
    Timeout(String),
    /// Resource not found
    NotFound(String),
    /// Authentication required
    Unauthorized(String),
}

impl AppError {
    pub fn parse(record: impl Into<String>, message: impl ToString) -> Self {
        AppError::Parse {
            record: record.into(),
            message: message.to_string(),
        }
    }

    pub fn io(record: impl Into<String>, message: impl ToString) -> Self {
        AppError::Io {
            record: record.into(),
            message: message.to_string(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Parse { .. }
            | AppError::Io { .. }
            | AppError::SnapshotFormat(_)
            | AppError::CatalogLoad(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Parse { .. } => codes::PARSE_ERROR,
            AppError::Io { .. } => codes::IO_ERROR,
            AppError::SnapshotFormat(_) => codes::SNAPSHOT_FORMAT_ERROR,
            AppError::CatalogLoad(_) => codes::CATALOG_LOAD_ERROR,
            AppError::Timeout(_) => codes::TIMEOUT,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Parse { record, message } => format!("{}: {}", record, message),
            AppError::Io { record, message } => format!("{}: {}", record, message),
            AppError::SnapshotFormat(msg) => msg.clone(),
            AppError::CatalogLoad(msg) => msg.clone(),
            AppError::Timeout(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Unauthorized(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
