//! HTTP request handlers.
//!
//! Every operation handler records an [`OperationResult`] whether it
//! succeeds or not, and answers with it on success. Stats reports are
//! telemetry and are not recorded.

pub mod health;
pub mod host;
pub mod mine;
pub mod operations;
pub mod stats;

use axum::Json;
use hashfleet_core::OperationResult;

use crate::error::ApiError;
use crate::state::NodeState;

/// Record the outcome of `operation` and turn it into a response.
pub(crate) fn finish(
    state: &NodeState,
    operation: &'static str,
    outcome: Result<String, ApiError>,
) -> Result<Json<OperationResult>, ApiError> {
    match outcome {
        Ok(description) => Ok(Json(state.operations.record(operation, 200, description))),
        Err(e) => {
            tracing::warn!(operation, error = %e, "Operation failed");
            state
                .operations
                .record(operation, e.http_status_code(), e.to_string());
            Err(e)
        }
    }
}
