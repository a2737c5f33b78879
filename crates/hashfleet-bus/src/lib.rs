//! Typed in-process message bus for hashfleet.
//!
//! Every other subsystem talks through this bus. Components register handlers
//! ("paths") against concrete message types; publishers push commands and
//! events without knowing who listens.
//!
//! # Architecture
//!
//! ```text
//!   execute(cmd) ──► [ TypeId(cmd) ] ──► exactly one command path
//!
//!   raise_event(ev) ─► [ TypeId(ev) ] ──┬─► path 1 (Normal)
//!                                       ├─► path 2 (Once)            ─► removed
//!                                       └─► path 3 (ViaTimesLimit n) ─► removed after n
//!
//!   Ticker ──► Per1SecondEvent / Per10SecondEvent / Per20SecondEvent
//! ```
//!
//! - Commands are 1:1: a second enabled command path for the same type is
//!   rejected with [`BusError::DuplicateRegistration`].
//! - Events fan out to every enabled path in registration order.
//! - A raise iterates a snapshot of the subscriber list, so handlers may
//!   register, remove or raise from inside a dispatch.
//! - Handler panics are caught and logged; they never reach the publisher or
//!   the remaining handlers.
//!
//! # Usage
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use hashfleet_bus::{Event, MessageBus, PathMode, PathOptions};
//!
//! struct Greeted;
//! impl Event for Greeted {}
//!
//! let bus = MessageBus::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! bus.register_event_path::<Greeted, _>(
//!     PathOptions::new("count greetings").mode(PathMode::Once),
//!     move |_| {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     },
//! )
//! .unwrap();
//!
//! bus.raise_event(&Greeted);
//! bus.raise_event(&Greeted);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bus;
pub mod error;
pub mod message;
pub mod path;
pub mod tick;

pub use bus::MessageBus;
pub use error::{BusError, Result};
pub use message::{Command, Event, MessageKind};
pub use path::{LogLevel, PathGroup, PathId, PathInfo, PathMode, PathOptions};
pub use tick::{seconds_delay, set_interval, Per10SecondEvent, Per1SecondEvent, Per20SecondEvent, Ticker};
