//! Error types module
//!
//! All errors that cross a crate boundary end up as an `AppError`. Each variant
//! describes how it should be presented over HTTP through `ErrorMetadata`.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Client-caused but noteworthy, e.g. ownership mismatches
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "STORAGE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from the client
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Media processing error: {0}")]
    MediaProcessing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("Invalid ID: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        AppError::Database(_) => (500, "DATABASE_ERROR", true, true, LogLevel::Error),
        AppError::Storage(_) => (500, "STORAGE_ERROR", true, true, LogLevel::Error),
        AppError::MediaProcessing(_) => {
            (500, "MEDIA_PROCESSING_ERROR", false, true, LogLevel::Error)
        }
        AppError::InvalidInput(_) => (400, "INVALID_INPUT", false, false, LogLevel::Debug),
        AppError::UnsupportedMediaType(_) => {
            (400, "UNSUPPORTED_MEDIA_TYPE", false, false, LogLevel::Debug)
        }
        AppError::NotFound(_) => (404, "NOT_FOUND", false, false, LogLevel::Debug),
        AppError::PayloadTooLarge(_) => (413, "PAYLOAD_TOO_LARGE", false, false, LogLevel::Debug),
        AppError::Unauthorized(_) => (401, "UNAUTHORIZED", false, false, LogLevel::Warn),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => {
            (500, "INTERNAL_ERROR", true, true, LogLevel::Error)
        }
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::MediaProcessing(_) => "MediaProcessing",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::UnsupportedMediaType(_) => "UnsupportedMediaType",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::MediaProcessing(_) => "Failed to process media file".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::UnsupportedMediaType(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
