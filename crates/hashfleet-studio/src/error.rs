//! Error types for the fleet studio.

use thiserror::Error;

/// A result type using `StudioError`.
pub type Result<T> = std::result::Result<T, StudioError>;

/// Errors that can occur while talking to the fleet or updating the view.
#[derive(Debug, Error)]
pub enum StudioError {
    /// The request never got a response.
    #[error("fleet request failed: {0}")]
    Transport(String),

    /// The fleet server answered with an error status.
    #[error("fleet server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error text from the response body.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("invalid fleet response: {0}")]
    Decode(String),

    /// The caller passed something unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Local settings could not be read or written.
    #[error("storage error: {0}")]
    Store(#[from] hashfleet_store::StoreError),

    /// The view consumer is gone.
    #[error("fleet view closed")]
    ViewClosed,

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StudioError {
    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_retry_only_on_5xx() {
        let busy = StudioError::Server {
            status: 503,
            message: "busy".into(),
        };
        let bad = StudioError::Server {
            status: 400,
            message: "bad".into(),
        };
        assert!(busy.is_retriable());
        assert!(!bad.is_retriable());
        assert!(StudioError::Transport("reset".into()).is_retriable());
        assert!(!StudioError::InvalidInput("page size".into()).is_retriable());
    }
}
