//! Liveness probe for the node.

use axum::extract::State;
use axum::Json;
use hashfleet_miner::MinePhase;
use serde::Serialize;

use crate::state::NodeState;

/// Liveness body. `phase` lets a fleet server tell an idle node from a stuck one.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the server answers.
    pub status: &'static str,
    /// Daemon version.
    pub version: &'static str,
    /// Current mining phase.
    pub phase: MinePhase,
    /// Number of stored operation results.
    pub operations: usize,
}

/// `GET /health`
pub async fn health(State(state): State<NodeState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        phase: state.controller.phase(),
        operations: state.operations.len(),
    })
}
