//! Mining lifecycle state machine.
//!
//! # State Machine
//!
//! ```text
//!          start_mine                 launch ok
//!   ┌──────┐ ─────────► ┌──────────┐ ─────────► ┌────────┐
//!   │ Idle │            │ Starting │            │ Mining │◄──────┐
//!   └──────┘ ◄───────── └──────────┘            └────────┘       │
//!      ▲     start failed                  │          │          │ relaunched
//!      │                        stop_mine  │          │ restart  │
//!      │     ┌──────────┐ ◄────────────────┘          ▼          │
//!      └──── │ Stopping │                       ┌────────────┐   │
//!            └──────────┘ ◄──────────────────── │ Restarting │ ──┘
//!                             relaunch failed   └────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{MinerError, Result};

/// Phase of the node's mining lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinePhase {
    /// Nothing is running.
    #[default]
    Idle,
    /// Validated; downloading, staging or launching the kernel.
    Starting,
    /// A kernel is running under the locked context.
    Mining,
    /// The locked context is being relaunched in place.
    Restarting,
    /// The locked context is being torn down.
    Stopping,
}

impl MinePhase {
    /// Returns true while a context is locked.
    #[must_use]
    pub const fn is_mining(&self) -> bool {
        matches!(self, Self::Mining | Self::Restarting)
    }
}

/// Validates a phase transition and returns the target phase if valid.
///
/// # Errors
///
/// Returns `MinerError::InvalidTransition` if the transition is not allowed.
pub fn validate_transition(from: MinePhase, to: MinePhase) -> Result<MinePhase> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(MinerError::InvalidTransition { from, to })
    }
}

/// Check if a phase transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: MinePhase, to: MinePhase) -> bool {
    use MinePhase::{Idle, Mining, Restarting, Starting, Stopping};

    matches!(
        (from, to),
        (Idle, Starting)
            | (Starting, Mining | Idle)
            | (Mining, Restarting | Stopping)
            | (Restarting, Mining | Stopping)
            | (Stopping, Idle)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(is_valid_transition(MinePhase::Idle, MinePhase::Starting));
        assert!(is_valid_transition(MinePhase::Starting, MinePhase::Mining));
        assert!(is_valid_transition(MinePhase::Starting, MinePhase::Idle));
        assert!(is_valid_transition(MinePhase::Mining, MinePhase::Restarting));
        assert!(is_valid_transition(MinePhase::Restarting, MinePhase::Mining));
        assert!(is_valid_transition(MinePhase::Mining, MinePhase::Stopping));
        assert!(is_valid_transition(MinePhase::Stopping, MinePhase::Idle));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!is_valid_transition(MinePhase::Idle, MinePhase::Mining));
        assert!(!is_valid_transition(MinePhase::Idle, MinePhase::Stopping));
        assert!(!is_valid_transition(MinePhase::Mining, MinePhase::Starting));
        assert!(!is_valid_transition(MinePhase::Stopping, MinePhase::Mining));
    }

    #[test]
    fn validate_reports_both_ends() {
        let err = validate_transition(MinePhase::Idle, MinePhase::Mining).unwrap_err();
        assert!(matches!(
            err,
            MinerError::InvalidTransition {
                from: MinePhase::Idle,
                to: MinePhase::Mining
            }
        ));
    }

    #[test]
    fn mining_phases() {
        assert!(MinePhase::Mining.is_mining());
        assert!(MinePhase::Restarting.is_mining());
        assert!(!MinePhase::Starting.is_mining());
    }
}
