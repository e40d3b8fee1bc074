//! Storage-specific error types.

/// Errors that can occur while writing navigation bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store refused the write because it is full
    #[error("Storage quota exceeded while writing '{key}'")]
    QuotaExceeded { key: String },

    /// A value could not be encoded as JSON
    #[error("Failed to serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}
