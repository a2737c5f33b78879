//! Error types for the node daemon.
//!
//! [`NodeError`] is what the node's own collaborators return; [`ApiError`]
//! is what the HTTP surface answers with.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use hashfleet_miner::MinerError;
use hashfleet_store::StoreError;

/// A result type using `NodeError`.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors from host operations and node wiring.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A host side effect failed.
    #[error("host operation failed: {0}")]
    Host(String),

    /// The mining layer failed.
    #[error(transparent)]
    Miner(#[from] MinerError),

    /// Local settings could not be read or written.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Bus registration failed.
    #[error("bus error: {0}")]
    Bus(#[from] hashfleet_bus::BusError),
}

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body is empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The request cannot be carried out in the node's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The status code as a number, as stored in operation results.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.status_code().as_u16()
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Miner(MinerError::Json { file, message }) => {
                Self::InvalidInput(format!("{file}: {message}"))
            }
            NodeError::Miner(MinerError::InvalidStats(message)) => Self::InvalidInput(message),
            other => {
                tracing::error!(error = %other, "Node error");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<MinerError> for ApiError {
    fn from(err: MinerError) -> Self {
        Self::from(NodeError::Miner(err))
    }
}
