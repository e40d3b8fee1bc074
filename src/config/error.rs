//! Configuration-specific error types.

use std::path::PathBuf;

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to find home directory
    #[error("Failed to find home directory")]
    HomeDirectoryNotFound,

    /// Failed to load configuration file
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to deserialize configuration
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationFailed(String),

    /// Set-up options did not name a namespace
    #[error("Set-up namespace not set")]
    NamespaceNotSet,

    /// The redirect strategy was selected without a redirect document
    #[error("Redirect HTML URL not set for the redirect strategy")]
    RedirectUrlNotSet,
}
