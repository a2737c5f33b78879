//! Common error types for hashfleet.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors shared across hashfleet crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// An unknown enum variant name was provided.
    #[error("unknown {kind}: {value}")]
    UnknownVariant {
        /// The kind of value being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
