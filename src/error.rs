//! Error types for CGM feature preparation

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading records or preparing features
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{}:{line}: {message}", path.display())]
    FlatFile {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}: missing column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Date parse error: {0}")]
    DateParse(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
