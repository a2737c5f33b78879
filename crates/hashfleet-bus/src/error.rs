//! Error types for the message bus.

use thiserror::Error;

use crate::path::PathId;

/// A result type using `BusError`.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors returned by path registration and removal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// An enabled command path already exists for this command type.
    #[error("command {type_name} already has a registered handler")]
    DuplicateRegistration {
        /// Type name of the command.
        type_name: &'static str,
    },

    /// A `ViaTimesLimit` path was requested with a zero limit.
    #[error("path limit must be at least 1")]
    InvalidLimit,

    /// No path with this ID is registered.
    #[error("path not found: {0}")]
    PathNotFound(PathId),
}
