//! Fleet studio for hashfleet.
//!
//! The studio watches a fleet of mining nodes through the fleet server. It
//! polls one page of node records at a time, reconciles each response into
//! a locally held, identity-stable view, and sends commands back out to the
//! selected nodes.
//!
//! # Architecture
//!
//! ```text
//!   Per10SecondEvent ──► Poller ── query_clients ──► FleetClient ──► fleet server
//!                          │                              ▲
//!                          │ ClientsUpdate (tagged sort)  │ start/stop/upgrade/...
//!                          ▼                              │
//!                  ┌──────────────┐                  Commander
//!                  │  FleetView   │  single consumer task
//!                  │  merge/sort  │
//!                  └──────┬───────┘
//!                         ▼
//!              watch::Receiver<Arc<FleetPage>>  ──► renderers
//! ```
//!
//! Sort directions and highlight thresholds are remembered through a
//! [`hashfleet_store::SettingsStore`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod commander;
pub mod config;
pub mod error;
pub mod events;
pub mod highlight;
pub mod poller;
pub mod query;
pub mod record;
pub mod sort;
pub mod view;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use client::{FleetClient, HttpFleetClient};
pub use commander::{Commander, FleetCommand};
pub use config::StudioConfig;
pub use error::{Result, StudioError};
pub use events::{
    ClientsQueriedEvent, ClientsQueryFailedEvent, CommandOutcome, FleetCommandCompletedEvent,
};
pub use highlight::{HighlightThresholds, RowHighlight, TempLevel};
pub use poller::Poller;
pub use query::{
    CoinSnapshot, FleetQuery, MineStateFilter, QueryClientsRequest, QueryClientsResponse,
    QueryFilter, DEFAULT_PAGE_SIZE, PAGE_SIZES,
};
pub use record::{ClientRecord, ClientView};
pub use sort::{ActiveSort, SortDirection, SortField, SortSpec};
pub use view::{ApplyPath, ClientsUpdate, FleetHandle, FleetPage, FleetRow, FleetView, Paging, ALL_COINS};
