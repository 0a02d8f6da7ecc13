//! Error types for definition tree operations.

use thiserror::Error;

/// Errors from loading or mutating a definition tree.
#[derive(Error, Debug)]
pub enum DefinitionError {
    /// Attachment target does not exist in the container.
    #[error("unknown parent definition in container {0}")]
    UnknownParent(String),

    /// A setting with this key already exists in the container.
    #[error("duplicate setting key: {0}")]
    DuplicateKey(String),

    /// Definition file is structurally invalid.
    #[error("invalid definition file: {0}")]
    InvalidDefinition(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for definition operations.
pub type Result<T> = std::result::Result<T, DefinitionError>;
