//! Error types for the filetag library.
//!
//! Schema problems are fatal and surface when a schema is loaded. Backend
//! operations surface missing sources and tool failures to the caller; tag
//! read degradation is handled inside each backend and never reaches here.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the filetag library.
#[derive(Debug, Error)]
pub enum FiletagError {
    // Schema errors
    #[error("Schema error for field '{field}': {message}")]
    Schema { field: String, message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Backend errors
    #[error("Source file does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("Backend {backend} is closed")]
    BackendClosed { backend: &'static str },

    #[error("{command} failed (exit code {exit_code:?}): {message}")]
    Tool {
        command: String,
        message: String,
        exit_code: Option<i32>,
    },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for filetag operations.
pub type Result<T> = std::result::Result<T, FiletagError>;

impl From<std::io::Error> for FiletagError {
    fn from(err: std::io::Error) -> Self {
        FiletagError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for FiletagError {
    fn from(err: serde_json::Error) -> Self {
        FiletagError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for FiletagError {
    fn from(err: rusqlite::Error) -> Self {
        FiletagError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl FiletagError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        FiletagError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a schema error for a field.
    pub fn schema(field: impl Into<String>, message: impl Into<String>) -> Self {
        FiletagError::Schema {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Check whether the failure came from the storage mechanism itself.
    ///
    /// Nothing in this crate retries; callers that wrap a flaky tool or
    /// filesystem can use this to decide.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FiletagError::Tool { .. } | FiletagError::Io { .. })
    }
}
