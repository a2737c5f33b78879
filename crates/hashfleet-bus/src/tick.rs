//! Periodic tick events and timer helpers.
//!
//! The [`Ticker`] raises wall-clock tick events that drive polling and the
//! watchdog. [`seconds_delay`] and [`set_interval`] cover the two common
//! timer shapes: "run once after N ticks" and "run every period until told
//! to stop".

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::bus::MessageBus;
use crate::error::Result;
use crate::message::Event;
use crate::path::{LogLevel, PathId, PathMode, PathOptions};

macro_rules! tick_event {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            /// Wall-clock time the tick was produced.
            pub born_on: DateTime<Utc>,
        }

        impl $name {
            /// Create a tick stamped with the given time.
            #[must_use]
            pub const fn new(born_on: DateTime<Utc>) -> Self {
                Self { born_on }
            }
        }

        impl Event for $name {}
    };
}

tick_event! {
    /// Raised every second.
    Per1SecondEvent
}

tick_event! {
    /// Raised every ten seconds.
    Per10SecondEvent
}

tick_event! {
    /// Raised every twenty seconds.
    Per20SecondEvent
}

/// Background task raising the periodic tick events.
pub struct Ticker;

impl Ticker {
    /// Spawn the tick loop on the current tokio runtime.
    ///
    /// The first tick fires one second after spawning. Abort the returned
    /// handle to stop ticking.
    #[must_use]
    pub fn spawn(bus: Arc<MessageBus>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;

            let mut seconds: u64 = 0;
            loop {
                interval.tick().await;
                seconds += 1;
                let born_on = Utc::now();

                bus.raise_event(&Per1SecondEvent::new(born_on));
                if seconds % 10 == 0 {
                    bus.raise_event(&Per10SecondEvent::new(born_on));
                }
                if seconds % 20 == 0 {
                    bus.raise_event(&Per20SecondEvent::new(born_on));
                }
            }
        })
    }
}

/// Run `callback` once after `seconds` one-second ticks.
///
/// With `seconds == 0` the callback runs immediately and no path is
/// registered.
///
/// # Errors
///
/// Propagates registration errors from the bus.
#[track_caller]
pub fn seconds_delay<F>(bus: &MessageBus, seconds: u32, callback: F) -> Result<Option<PathId>>
where
    F: FnOnce() + Send + 'static,
{
    if seconds == 0 {
        callback();
        return Ok(None);
    }

    let callback = Mutex::new(Some(callback));
    let elapsed = AtomicU32::new(0);
    let id = bus.register_event_path::<Per1SecondEvent, _>(
        PathOptions::new(format!("delay {seconds}s"))
            .log_level(LogLevel::None)
            .mode(PathMode::ViaTimesLimit(seconds)),
        move |_| {
            if elapsed.fetch_add(1, Ordering::AcqRel) + 1 == seconds {
                if let Some(cb) = callback.lock().take() {
                    cb();
                }
            }
        },
    )?;
    Ok(Some(id))
}

/// Call `per_callback` every `period` until `request_stop` returns true or
/// `timeout` elapses, then call `stop_callback` once.
///
/// `request_stop` is checked before every call to `per_callback`.
pub fn set_interval<P, S, R>(
    period: Duration,
    per_callback: P,
    stop_callback: S,
    timeout: Option<Duration>,
    request_stop: R,
) -> JoinHandle<()>
where
    P: Fn() + Send + 'static,
    S: FnOnce() + Send + 'static,
    R: Fn() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let started = Instant::now();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            interval.tick().await;
            let timed_out = timeout.is_some_and(|t| started.elapsed() >= t);
            if timed_out || request_stop() {
                break;
            }
            per_callback();
        }
        stop_callback();
    })
}
