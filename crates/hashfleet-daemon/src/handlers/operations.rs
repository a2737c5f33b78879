//! Operation result endpoint.

use axum::extract::{Query, State};
use axum::Json;
use hashfleet_core::OperationResult;
use serde::Deserialize;

use crate::state::NodeState;

/// Query parameters for operation results.
#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    /// Only results newer than this unix time in milliseconds.
    #[serde(default)]
    pub after: i64,
}

/// List operation results newer than `after`, oldest first.
pub async fn operation_results(
    State(state): State<NodeState>,
    Query(query): Query<ResultsQuery>,
) -> Json<Vec<OperationResult>> {
    Json(state.operations.after(query.after))
}
