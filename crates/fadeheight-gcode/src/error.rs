//! Error types for G-code plate sets.

use thiserror::Error;

/// Errors from parsing or serializing plate sets.
#[derive(Error, Debug)]
pub enum GcodeError {
    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for G-code operations.
pub type Result<T> = std::result::Result<T, GcodeError>;
