//! Events raised by the studio.

use hashfleet_bus::Event;
use hashfleet_core::ClientId;

use crate::sort::ActiveSort;

/// A fleet query succeeded.
#[derive(Debug, Clone, Copy)]
pub struct ClientsQueriedEvent {
    /// The sort the query was issued under.
    pub sort: ActiveSort,
    /// Records on the page.
    pub rows: usize,
    /// Records matching the filter.
    pub total: u32,
}
impl Event for ClientsQueriedEvent {}

/// A fleet query failed.
#[derive(Debug, Clone)]
pub struct ClientsQueryFailedEvent {
    /// Error text.
    pub message: String,
}
impl Event for ClientsQueryFailedEvent {}

/// Result of a fleet command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Every target accepted the command.
    Ok,
    /// At least one target failed.
    Failed(String),
}

impl CommandOutcome {
    /// Returns true for `Ok`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// A fleet command finished, successfully or not.
#[derive(Debug, Clone)]
pub struct FleetCommandCompletedEvent {
    /// Command name.
    pub command: &'static str,
    /// Targets.
    pub client_ids: Vec<ClientId>,
    /// Result.
    pub outcome: CommandOutcome,
}
impl Event for FleetCommandCompletedEvent {}
