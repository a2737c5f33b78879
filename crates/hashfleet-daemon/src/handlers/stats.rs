//! Kernel stats intake.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use hashfleet_core::KernelStatsReport;
use hashfleet_miner::MiningProbe;

use crate::error::ApiError;
use crate::state::NodeState;

/// Record the hash rate and share totals of the running kernel.
///
/// Reports arrive every few seconds, so they are not kept as operation
/// results.
///
/// # Errors
///
/// Returns `ApiError::Conflict` when not mining and
/// `ApiError::InvalidInput` for a report that does not fit the run.
pub async fn report_stats(
    State(state): State<NodeState>,
    Json(report): Json<KernelStatsReport>,
) -> Result<StatusCode, ApiError> {
    let Some(context) = state.controller.locked_context() else {
        return Err(ApiError::Conflict("not mining".into()));
    };
    state.stats.record(&context, &report, Utc::now())?;
    Ok(StatusCode::NO_CONTENT)
}
