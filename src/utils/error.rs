//! Error types for the page shim

use thiserror::Error;

/// Main error type for shim operations
#[derive(Debug, Error)]
pub enum ShimError {
    /// The native transport reported a failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// A response body could not be parsed as JSON
    #[error("malformed response body: {0}")]
    MalformedBody(#[source] serde_json::Error),
    /// A request was sent while a previous one on the same client is in flight
    #[error("request already pending on this client")]
    AlreadyPending,
    /// `send` was called before `open`
    #[error("request was never opened")]
    NotOpened,
    /// URL could not be parsed or resolved
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// base64 input could not be decoded
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Configuration could not be loaded
    #[error("config error: {0}")]
    Config(String),
    /// Script evaluation failed
    #[error("script error: {0}")]
    Script(String),
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by the native transport primitive.
///
/// The message is whatever the host handed back; it is never rewritten so that
/// promise-style callers observe the exact native error value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Wrap a host error message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The completion callback was dropped without ever being invoked
    pub fn dropped() -> Self {
        Self::new("native completion dropped before delivery")
    }

    /// The host error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Convenience Result type for shim operations
pub type Result<T> = std::result::Result<T, ShimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display_is_verbatim() {
        let err = TransportError::new("connection refused");
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(err.message(), "connection refused");
    }

    #[test]
    fn test_transport_error_converts() {
        let err: ShimError = TransportError::new("boom").into();
        assert!(matches!(err, ShimError::Transport(_)));
        assert_eq!(err.to_string(), "transport error: boom");
    }
}
