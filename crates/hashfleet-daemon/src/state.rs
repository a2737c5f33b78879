//! Node application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use hashfleet_miner::{MiningController, StatsFeed, WorkFiles};

use crate::config::NodeConfig;
use crate::host::HostOps;
use crate::operation::OperationResultSet;

/// Shared application state for the node HTTP surface.
#[derive(Clone)]
pub struct NodeState {
    /// The mining controller.
    pub controller: Arc<MiningController>,
    /// Host side effects.
    pub host: Arc<dyn HostOps>,
    /// Work files written by mine-start requests.
    pub work_files: WorkFiles,
    /// Results of remote operations.
    pub operations: Arc<OperationResultSet>,
    /// Where kernel stats reports go.
    pub stats: StatsFeed,
    /// Node configuration.
    pub config: NodeConfig,
}

impl std::fmt::Debug for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeState")
            .field("controller", &self.controller)
            .field("work_files", &self.work_files)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
