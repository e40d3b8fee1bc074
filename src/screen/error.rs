//! Screen registry error types.

/// Errors that can occur while resolving screen types.
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    /// No callbacks were registered for the screen type
    #[error("Unknown screen type: {screen_type}")]
    UnknownType { screen_type: String },
}
