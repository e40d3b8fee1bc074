//! Navigation payload error types.

/// Errors that can occur while encoding or decoding navigation payloads.
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    /// A history payload could not be converted to or from JSON
    #[error("Invalid history payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A redirect hand-off fragment was not valid base64
    #[error("Invalid redirect hand-off encoding: {0}")]
    HandOffEncoding(#[from] base64::DecodeError),

    /// A URL did not carry a redirect hand-off fragment
    #[error("No hand-off fragment in URL: {url}")]
    MissingFragment { url: String },
}
