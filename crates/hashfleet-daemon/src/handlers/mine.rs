//! Mining endpoints.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use hashfleet_core::{OperationResult, WorkRequest, WorkType};
use hashfleet_miner::{ContextSummary, MinePhase, MineStopReason, StartOutcome};
use serde::Serialize;

use super::finish;
use crate::error::ApiError;
use crate::state::NodeState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Mining state of the node.
#[derive(Debug, Serialize)]
pub struct MineStateResponse {
    /// Lifecycle phase.
    pub phase: MinePhase,
    /// The locked context, while mining.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextSummary>,
    /// Where the configuration comes from.
    pub work_type: WorkType,
}

// =============================================================================
// Handlers
// =============================================================================

/// Start (or restart) mining.
///
/// For a work type other than `none` both documents must be given; they are
/// written to the work files first. The node restarts when it is already
/// mining or a work type is given, and does a plain start otherwise.
///
/// # Errors
///
/// Returns `ApiError::InvalidInput` for missing or malformed work documents
/// and `ApiError::Conflict` when the start is refused.
pub async fn start_mine(
    State(state): State<NodeState>,
    Json(body): Json<WorkRequest>,
) -> Result<Json<OperationResult>, ApiError> {
    let outcome = start(&state, body).await;
    finish(&state, "start_mine", outcome)
}

async fn start(state: &NodeState, body: WorkRequest) -> Result<String, ApiError> {
    if body.work_type.is_work() {
        let (Some(local), Some(server)) = (
            non_empty(body.local_json.as_deref()),
            non_empty(body.server_json.as_deref()),
        ) else {
            return Err(ApiError::InvalidInput(
                "work documents are required for a work type".into(),
            ));
        };
        state
            .work_files
            .write(body.work_type, local, server)
            .await?;
    }

    let controller = &state.controller;
    let outcome = if controller.is_mining() || body.work_type.is_work() {
        controller
            .restart_mine(body.work_type, non_empty(body.worker_name.as_deref()).map(str::to_string))
            .await
    } else {
        controller.start_mine(false).await
    };

    match outcome {
        StartOutcome::Started(context) => Ok(format!(
            "mining {} with {}",
            context.spec().main.coin_code,
            context.spec().kernel.full_name()
        )),
        StartOutcome::Failed(reason) => Err(ApiError::Conflict(reason.to_string())),
    }
}

/// Stop mining.
///
/// # Errors
///
/// Never fails; stopping an idle node is reported as such.
pub async fn stop_mine(State(state): State<NodeState>) -> Result<Json<OperationResult>, ApiError> {
    let stopped = state.controller.stop_mine(MineStopReason::RemoteCommand).await;
    let description = if stopped { "mine stopped" } else { "not mining" };
    finish(&state, "stop_mine", Ok(description.to_string()))
}

/// Report the mining state.
pub async fn mine_state(State(state): State<NodeState>) -> impl IntoResponse {
    let controller = &state.controller;
    Json(MineStateResponse {
        phase: controller.phase(),
        context: controller.current_context().map(|c| c.summary()),
        work_type: controller.work_type(),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
