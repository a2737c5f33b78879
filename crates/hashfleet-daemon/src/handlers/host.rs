//! Host operation endpoints.
//!
//! Each request is validated, handed to [`HostOps`](crate::host::HostOps)
//! and recorded in the operation log.

use axum::extract::State;
use axum::Json;
use hashfleet_core::{
    AutoBootRequest, LocalIpsRequest, OperationResult, RadeonSwitchRequest, UpgradeRequest,
    VirtualMemoryRequest,
};

use super::finish;
use crate::error::ApiError;
use crate::state::NodeState;

// =============================================================================
// Handlers
// =============================================================================

/// Upgrade the node software.
///
/// # Errors
///
/// Returns `ApiError::InvalidInput` for an empty file name.
pub async fn upgrade(
    State(state): State<NodeState>,
    Json(body): Json<UpgradeRequest>,
) -> Result<Json<OperationResult>, ApiError> {
    let outcome = run_upgrade(&state, &body).await;
    finish(&state, "upgrade", outcome)
}

/// Resize paging files.
///
/// # Errors
///
/// Returns `ApiError::InvalidInput` when no drive is given.
pub async fn set_virtual_memory(
    State(state): State<NodeState>,
    Json(body): Json<VirtualMemoryRequest>,
) -> Result<Json<OperationResult>, ApiError> {
    let outcome = run_set_virtual_memory(&state, &body).await;
    finish(&state, "set_virtual_memory", outcome)
}

/// Reconfigure network adapters.
///
/// # Errors
///
/// Returns `ApiError::InvalidInput` when no adapter is given, an adapter id
/// is empty, or a static adapter has no address.
pub async fn set_local_ips(
    State(state): State<NodeState>,
    Json(body): Json<LocalIpsRequest>,
) -> Result<Json<OperationResult>, ApiError> {
    let outcome = run_set_local_ips(&state, &body).await;
    finish(&state, "set_local_ips", outcome)
}

/// Switch Radeon cards between compute and graphics mode.
///
/// # Errors
///
/// Returns `ApiError::Internal` if the host refuses.
pub async fn switch_radeon_gpu(
    State(state): State<NodeState>,
    Json(body): Json<RadeonSwitchRequest>,
) -> Result<Json<OperationResult>, ApiError> {
    let outcome = run_switch_radeon_gpu(&state, body).await;
    finish(&state, "switch_radeon_gpu", outcome)
}

/// Set the autostart flags.
///
/// # Errors
///
/// Returns `ApiError::Internal` if the flags cannot be saved or the host
/// refuses the boot registration.
pub async fn set_auto_boot(
    State(state): State<NodeState>,
    Json(body): Json<AutoBootRequest>,
) -> Result<Json<OperationResult>, ApiError> {
    let outcome = run_set_auto_boot(&state, body).await;
    finish(&state, "set_auto_boot", outcome)
}

// =============================================================================
// Operations
// =============================================================================

async fn run_upgrade(state: &NodeState, body: &UpgradeRequest) -> Result<String, ApiError> {
    if body.file_name.trim().is_empty() {
        return Err(ApiError::InvalidInput("file_name is empty".into()));
    }
    state.host.upgrade(body).await?;
    Ok(format!("upgrading to {}", body.file_name))
}

async fn run_set_virtual_memory(
    state: &NodeState,
    body: &VirtualMemoryRequest,
) -> Result<String, ApiError> {
    if body.drives.is_empty() || body.drives.keys().any(|d| d.trim().is_empty()) {
        return Err(ApiError::InvalidInput("no drives given".into()));
    }
    state.host.set_virtual_memory(body).await?;
    let total: u64 = body.drives.values().map(|mb| u64::from(*mb)).sum();
    Ok(format!(
        "virtual memory set on {} drives, {total} MB",
        body.drives.len()
    ))
}

async fn run_set_local_ips(state: &NodeState, body: &LocalIpsRequest) -> Result<String, ApiError> {
    if body.items.is_empty() {
        return Err(ApiError::InvalidInput("no adapters given".into()));
    }
    for item in &body.items {
        if item.adapter_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("adapter_id is empty".into()));
        }
        if !item.is_auto_dhcp && (item.ip_address.is_empty() || item.subnet_mask.is_empty()) {
            return Err(ApiError::InvalidInput(format!(
                "static adapter {} needs an address and mask",
                item.adapter_id
            )));
        }
    }
    state.host.set_local_ips(body).await?;
    Ok(format!("{} adapters reconfigured", body.items.len()))
}

async fn run_switch_radeon_gpu(
    state: &NodeState,
    body: RadeonSwitchRequest,
) -> Result<String, ApiError> {
    state.host.switch_radeon_gpu(body.compute_mode).await?;
    let mode = if body.compute_mode { "compute" } else { "graphics" };
    Ok(format!("radeon cards switched to {mode} mode"))
}

async fn run_set_auto_boot(state: &NodeState, body: AutoBootRequest) -> Result<String, ApiError> {
    state
        .controller
        .set_auto_start(body.auto_boot, body.auto_start)?;
    state.host.set_auto_boot(body.auto_boot).await?;
    Ok(format!(
        "auto_boot={} auto_start={}",
        body.auto_boot, body.auto_start
    ))
}
