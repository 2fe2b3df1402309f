//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Minuteflow
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum MinuteflowError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Circuit open: {0}")]
    CircuitOpen(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Minuteflow operations
pub type Result<T> = std::result::Result<T, MinuteflowError>;

impl From<serde_json::Error> for MinuteflowError {
    fn from(err: serde_json::Error) -> Self {
        MinuteflowError::InvalidInput(format!("JSON error: {err}"))
    }
}
