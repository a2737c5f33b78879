//! Mining lifecycle for a hashfleet node.
//!
//! A node mines one coin (optionally two) with one external kernel process.
//! This crate decides whether a start is allowed, stages the kernel package,
//! owns the single active [`MineContext`] and restarts things when the
//! [`Watchdog`] sees the run going bad.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────── MessageBus ───────────────────────┐
//!   StartMineCommand │  StopMineCommand   RestartMineCommand   Per20SecondEvent  │
//!                    └──────┬──────────────────┬──────────────────────┬──────────┘
//!                           ▼                  ▼                      ▼
//!                  ┌──────────────────────────────────┐      ┌──────────────────┐
//!                  │         MiningController         │◄─────│     Watchdog     │
//!                  │  resolve_spec ─► KernelPackages  │probe │ low speed        │
//!                  │               ─► KernelRunner    │      │ periodic restart │
//!                  │  WorkFiles (self/mine work)      │      │ no share         │
//!                  └──────────────────────────────────┘      └──────────────────┘
//!                           │
//!                           ▼
//!    MineStartedEvent / StartingMineFailedEvent / MineStoppedEvent
//! ```
//!
//! # Lifecycle
//!
//! `Idle → Starting → Mining → (Restarting → Mining) → Stopping → Idle`.
//! A failed start goes back to `Idle`; a refused start never leaves the
//! current phase. See [`MinePhase`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod events;
pub mod gpus;
pub mod lifecycle;
pub mod packages;
pub mod profile;
pub mod runner;
pub mod shares;
pub mod validate;
pub mod watchdog;
pub mod workspace;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use catalog::{Catalog, Coin, CoinKernel, Kernel, Pool};
pub use config::MinerConfig;
pub use context::{CoinSelection, ContextSummary, MineContext, MineSpec};
pub use controller::{MiningController, MiningProbe, StartOutcome, DEFAULT_EXIT_GRACE_SECONDS};
pub use error::{MinerError, Result, StartMineError};
pub use events::{
    KernelExitedEvent, MineStartedEvent, MineStopReason, MineStoppedEvent, RestartComputerCommand,
    RestartMineCommand, SetAutoStartCommand, StartMineCommand, StartingMineEvent,
    StartingMineFailedEvent, StopMineCommand,
};
pub use gpus::{Gpu, GpuSet};
pub use lifecycle::MinePhase;
pub use packages::{FsKernelPackages, KernelPackages};
pub use profile::MinerProfile;
pub use runner::{KernelRunner, NoopKernelRunner, ProcessKernelRunner};
pub use shares::{CoinShare, CoinShareSet, SpeedSet, StatsFeed};
pub use validate::resolve_spec;
pub use watchdog::{RestartCause, RestartDecision, Watchdog};
pub use workspace::WorkFiles;
