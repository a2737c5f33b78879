//! Core types and identifiers for hashfleet.
//!
//! This crate provides the foundational types shared by the mining node and
//! the fleet studio:
//!
//! - **Identifiers**: Strongly-typed UUID IDs for clients, coins, pools, kernels
//!   and mining contexts
//! - **Domain enums**: GPU vendor type and work mode
//! - **Node wire types**: Requests and results of the node control surface
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use hashfleet_core::{ClientId, CoinId, GpuType, WorkType};
//!
//! let client = ClientId::generate();
//! let parsed: ClientId = client.to_string().parse().unwrap();
//! assert_eq!(client, parsed);
//!
//! assert!(CoinId::nil().is_nil());
//! assert_eq!(GpuType::default(), GpuType::Empty);
//! assert!(!WorkType::None.is_work());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod node;
pub mod types;

pub use error::{CoreError, Result};
pub use ids::{ClientId, CoinId, CoinKernelId, ContextId, GroupId, IdError, KernelId, PoolId, WorkId};
pub use node::{
    AutoBootRequest, CoinStatsReport, KernelStatsReport, LocalIpInput, LocalIpsRequest,
    OperationResult, RadeonSwitchRequest, UpgradeRequest, VirtualMemoryRequest, WorkRequest,
};
pub use types::{GpuType, WorkType};
