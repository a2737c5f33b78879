//! Node daemon for hashfleet.
//!
//! A node runs one mining kernel under the [`MiningController`], watched by
//! the [`Watchdog`], and exposes a small HTTP surface through which the
//! fleet starts, stops and reconfigures it.
//!
//! # Architecture
//!
//! ```text
//!            fleet server / studio
//!                     │ HTTP
//!                     ▼
//! ┌──────────────────────────────────────────────┐
//! │  Router (trace, CORS, body limit, timeout)    │
//! │  /v1/mine/*   /v1/upgrade   /v1/autoboot ...  │
//! └──────┬───────────────────────────┬───────────┘
//!        │                           │
//!        ▼                           ▼
//!  MiningController ◄── probe ── Watchdog        HostOps
//!        ▲                           │          (restart, upgrade,
//!        │        MessageBus         │           network, memory)
//!        └──── commands / events ────┘               ▲
//!                     │                              │
//!                     └── RestartComputerCommand ────┘
//!                         SetAutoStartCommand
//! ```
//!
//! Every HTTP operation leaves an [`OperationResult`](hashfleet_core::OperationResult)
//! in the [`OperationResultSet`].
//!
//! [`MiningController`]: hashfleet_miner::MiningController
//! [`Watchdog`]: hashfleet_miner::Watchdog

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod host;
pub mod node;
pub mod operation;
pub mod routes;
pub mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::NodeConfig;
pub use error::{ApiError, NodeError, Result};
pub use host::{HostOps, LoggingHostOps};
pub use node::Node;
pub use operation::{OperationResultSet, DEFAULT_OPERATION_CAPACITY};
pub use routes::create_router;
pub use state::NodeState;
