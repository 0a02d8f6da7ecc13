//! Error types for the plugin.

use fadeheight_settings::DefinitionError;
use thiserror::Error;

/// Errors from configuring or running the plugin.
#[derive(Error, Debug)]
pub enum PluginError {
    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Definition container refused an attachment.
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;
