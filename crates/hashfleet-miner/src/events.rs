//! Commands and events of the mining lifecycle.

use std::sync::Arc;

use hashfleet_bus::{Command, Event};
use hashfleet_core::{ContextId, WorkType};
use serde::{Deserialize, Serialize};

use crate::context::MineContext;

/// Why a mining run was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MineStopReason {
    /// Superseded by a new start.
    InStartMine,
    /// Torn down while restarting.
    InRestartMine,
    /// The local user asked.
    UserAction,
    /// A fleet operator asked.
    RemoteCommand,
    /// The process is exiting.
    AppExit,
    /// The kernel exited on its own.
    KernelExited,
}

impl MineStopReason {
    /// Human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InStartMine => "superseded by a new start",
            Self::InRestartMine => "restarting",
            Self::UserAction => "stopped by user",
            Self::RemoteCommand => "stopped remotely",
            Self::AppExit => "application exit",
            Self::KernelExited => "kernel exited",
        }
    }
}

// =========================================================================
// Events
// =========================================================================

/// A start was requested; raised before validation.
#[derive(Debug, Clone, Copy)]
pub struct StartingMineEvent {
    /// Whether an in-place restart was requested.
    pub is_restart: bool,
}
impl Event for StartingMineEvent {}

/// The kernel is running under a locked context.
#[derive(Debug, Clone)]
pub struct MineStartedEvent {
    /// The locked context.
    pub context: Arc<MineContext>,
}
impl Event for MineStartedEvent {}

/// A start was refused or failed.
#[derive(Debug, Clone)]
pub struct StartingMineFailedEvent {
    /// Human-readable reason.
    pub reason: String,
}
impl Event for StartingMineFailedEvent {}

/// Mining stopped; the context is already detached.
#[derive(Debug, Clone)]
pub struct MineStoppedEvent {
    /// The closed context.
    pub context: Arc<MineContext>,
    /// Why it stopped.
    pub reason: MineStopReason,
}
impl Event for MineStoppedEvent {}

/// A kernel process exited without being stopped.
#[derive(Debug, Clone, Copy)]
pub struct KernelExitedEvent {
    /// The context the kernel was running for.
    pub context_id: ContextId,
    /// Exit code, `None` when killed by a signal or not observable.
    pub code: Option<i32>,
}
impl Event for KernelExitedEvent {}

// =========================================================================
// Commands
// =========================================================================

/// Start mining.
#[derive(Debug, Clone, Copy)]
pub struct StartMineCommand {
    /// Restart the locked context in place if mining.
    pub is_restart: bool,
}
impl Command for StartMineCommand {}

/// Stop mining.
#[derive(Debug, Clone, Copy)]
pub struct StopMineCommand {
    /// Why.
    pub reason: MineStopReason,
}
impl Command for StopMineCommand {}

/// Restart mining, optionally switching work mode.
#[derive(Debug, Clone, Default)]
pub struct RestartMineCommand {
    /// New work mode; `None` keeps the current one.
    pub work_type: Option<WorkType>,
    /// New worker name; `None` keeps the current one.
    pub worker_name: Option<String>,
}
impl Command for RestartMineCommand {}

/// Restart the whole machine after a countdown.
#[derive(Debug, Clone)]
pub struct RestartComputerCommand {
    /// Seconds to wait before restarting.
    pub countdown_seconds: u32,
    /// Human-readable trigger description.
    pub reason: String,
}
impl Command for RestartComputerCommand {}

/// Configure launch-at-boot and mine-on-launch.
#[derive(Debug, Clone, Copy)]
pub struct SetAutoStartCommand {
    /// Launch the app at OS boot.
    pub auto_boot: bool,
    /// Start mining when the app launches.
    pub auto_start: bool,
}
impl Command for SetAutoStartCommand {}
