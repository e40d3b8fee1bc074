//! Crate-wide error types.
//!
//! This module defines the main error type hierarchy for the history manager,
//! allowing for type-safe error handling throughout the codebase.

pub use crate::config::ConfigError;
pub use crate::navigation::NavigationError;
pub use crate::screen::ScreenError;
pub use crate::storage::StorageError;

/// Main history manager error type.
///
/// This is the top-level error type that encompasses all error types
/// in the crate. It uses `thiserror` for automatic error derivation
/// and conversion.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Screen registry errors
    #[error("Screen error: {0}")]
    Screen(#[from] ScreenError),

    /// Navigation payload errors
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Context-scoped storage was requested before a history id existed
    #[error("History id not initialized; context-scoped storage is unavailable")]
    HistoryIdUninitialized,

    /// The primitive has no managed position yet
    #[error("History has not been set up")]
    NotSetUp,

    /// No entry is held at the index
    #[error("No entry at index {index}")]
    MissingEntry { index: i64 },

    /// Collapse bounds do not describe a range inside the stack
    #[error("Invalid collapse range [{start}, {end}) for max index {max}")]
    InvalidRange { start: i64, end: i64, max: i64 },

    /// The navigation primitive does not keep payloads
    #[error("Navigation primitive does not preserve state payloads")]
    Unsupported,

    /// The document went away while a navigation was awaited
    #[error("Document unloaded before the navigation settled")]
    DocumentUnloaded,

    /// A step-wise walk did not reach its target
    #[error("Navigation did not settle after {steps} steps")]
    NavigationStalled { steps: usize },
}

/// Convenience type alias for Result with HistoryError
pub type HistoryResult<T> = Result<T, HistoryError>;
