//! The watchdog policy engine.
//!
//! Every 20-second tick the watchdog checks its restart triggers in a fixed
//! order and acts on the first one that fires:
//!
//! ```text
//!   low speed ──► periodic computer ──► periodic kernel ──► no share
//!   (machine)     (machine)             (kernel)            (machine, then kernel)
//! ```
//!
//! Machine restarts latch: after one is requested, later ticks are ignored.

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration, Utc};
use hashfleet_bus::{MessageBus, PathGroup, PathOptions, Per20SecondEvent};
use parking_lot::Mutex;

use crate::context::MineContext;
use crate::controller::MiningProbe;
use crate::error::{MinerError, Result};
use crate::events::{MineStartedEvent, RestartComputerCommand, RestartMineCommand, SetAutoStartCommand};
use crate::shares::{CoinShareSet, SpeedSet};

/// Countdown shown before a machine restart.
pub const RESTART_COUNTDOWN_SECONDS: u32 = 10;

/// Which trigger fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartCause {
    /// Hash rate stayed below the floor.
    LowSpeed {
        /// Window in minutes.
        minutes: u32,
    },
    /// Machine uptime limit reached.
    PeriodicComputer {
        /// Limit in minutes.
        minutes: i64,
    },
    /// Session length limit reached.
    PeriodicKernel {
        /// Limit in minutes.
        minutes: i64,
    },
    /// No share was submitted within the window.
    NoShare {
        /// Window in minutes.
        minutes: u32,
    },
}

impl fmt::Display for RestartCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowSpeed { minutes } => write!(f, "hash rate below floor for {minutes} minutes"),
            Self::PeriodicComputer { minutes } => write!(f, "machine up for {minutes} minutes"),
            Self::PeriodicKernel { minutes } => write!(f, "kernel running for {minutes} minutes"),
            Self::NoShare { minutes } => write!(f, "no share for {minutes} minutes"),
        }
    }
}

/// What the watchdog decided on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart the machine.
    Computer(RestartCause),
    /// Restart the kernel.
    Kernel(RestartCause),
}

impl RestartDecision {
    /// The trigger behind the decision.
    #[must_use]
    pub const fn cause(&self) -> RestartCause {
        match self {
            Self::Computer(cause) | Self::Kernel(cause) => *cause,
        }
    }
}

#[derive(Debug)]
struct WatchState {
    share_count: u64,
    share_on: DateTime<Utc>,
    high_speed_on: DateTime<Utc>,
    machine_restart_requested: bool,
}

/// Evaluates restart triggers.
pub struct Watchdog {
    probe: Arc<dyn MiningProbe>,
    shares: Arc<CoinShareSet>,
    speeds: Arc<SpeedSet>,
    bus: Arc<MessageBus>,
    process_started_on: DateTime<Utc>,
    state: Mutex<WatchState>,
}

impl Watchdog {
    /// Create a watchdog for a process started at `process_started_on`.
    #[must_use]
    pub fn new(
        probe: Arc<dyn MiningProbe>,
        shares: Arc<CoinShareSet>,
        speeds: Arc<SpeedSet>,
        bus: Arc<MessageBus>,
        process_started_on: DateTime<Utc>,
    ) -> Self {
        Self {
            probe,
            shares,
            speeds,
            bus,
            process_started_on,
            state: Mutex::new(WatchState {
                share_count: 0,
                share_on: process_started_on,
                high_speed_on: process_started_on,
                machine_restart_requested: false,
            }),
        }
    }

    /// Reset the share baseline for a started context.
    ///
    /// An in-place restart keeps the no-share timer running so that
    /// repeated kernel restarts still escalate to a machine restart.
    pub fn on_mine_started(&self, context: &MineContext) {
        let at = context.started_on().unwrap_or_else(Utc::now);
        let mut state = self.state.lock();
        state.share_count = 0;
        state.high_speed_on = at;
        if !context.is_restart() {
            state.share_on = at;
        }
    }

    /// True once a machine restart has been requested.
    #[must_use]
    pub fn machine_restart_requested(&self) -> bool {
        self.state.lock().machine_restart_requested
    }

    /// Evaluate all triggers for a tick born at `born_on`.
    #[must_use]
    pub fn evaluate(&self, born_on: DateTime<Utc>) -> Option<RestartDecision> {
        let mut state = self.state.lock();
        if state.machine_restart_requested {
            return None;
        }
        let profile = self.probe.profile();
        let context = self.probe.locked_context();
        let settings = &profile.watchdog;

        if let Some(ctx) = &context {
            if ctx.started_on().is_some() {
                let low = profile.coin_profile(&profile.coin_id).low_speed;
                if low.enabled && low.low_speed > 0.0 && low.minutes > 0 {
                    let window = Duration::minutes(i64::from(low.minutes));
                    let speed = self.speeds.current();
                    if speed.speed_on + window >= born_on && speed.value >= low.low_speed {
                        state.high_speed_on = born_on;
                    }
                    if state.high_speed_on + window < born_on {
                        return Some(RestartDecision::Computer(RestartCause::LowSpeed {
                            minutes: low.minutes,
                        }));
                    }
                } else {
                    state.high_speed_on = born_on;
                }
            }
        }

        let uptime_limit = settings.periodic_computer_minutes();
        if settings.periodic_restart_computer
            && uptime_limit > 0
            && born_on - self.process_started_on > Duration::minutes(uptime_limit)
        {
            return Some(RestartDecision::Computer(RestartCause::PeriodicComputer {
                minutes: uptime_limit,
            }));
        }

        let ctx = context?;
        let started_on = ctx.started_on()?;
        let session = born_on - started_on;

        let session_limit = settings.periodic_kernel_minutes();
        if settings.periodic_restart_kernel
            && session_limit > 0
            && session > Duration::minutes(session_limit)
        {
            return Some(RestartDecision::Kernel(RestartCause::PeriodicKernel {
                minutes: session_limit,
            }));
        }

        let spec = ctx.spec();
        let mut total = self.shares.get(&spec.main.coin_id).total();
        if let Some(dual) = &spec.dual {
            total += self.shares.get(&dual.coin_id).total();
        }
        if total != state.share_count {
            // Counters restart from zero with the kernel.
            state.share_count = total;
            state.share_on = born_on;
            return None;
        }

        let idle = born_on - state.share_on;
        let exceeded = |enabled: bool, minutes: u32| {
            let window = Duration::minutes(i64::from(minutes));
            enabled && minutes > 0 && idle > window && session > window
        };
        if exceeded(
            settings.no_share_restart_computer,
            settings.no_share_restart_computer_minutes,
        ) {
            return Some(RestartDecision::Computer(RestartCause::NoShare {
                minutes: settings.no_share_restart_computer_minutes,
            }));
        }
        if exceeded(
            settings.no_share_restart_kernel,
            settings.no_share_restart_kernel_minutes,
        ) {
            return Some(RestartDecision::Kernel(RestartCause::NoShare {
                minutes: settings.no_share_restart_kernel_minutes,
            }));
        }
        None
    }

    /// Issue the commands for a decision.
    pub fn act(&self, decision: RestartDecision) {
        if !self.probe.autostart_configured() {
            self.bus.execute(&SetAutoStartCommand {
                auto_boot: true,
                auto_start: true,
            });
        }
        match decision {
            RestartDecision::Computer(cause) => {
                self.state.lock().machine_restart_requested = true;
                tracing::warn!(cause = %cause, "Watchdog restarting computer");
                self.bus.execute(&RestartComputerCommand {
                    countdown_seconds: RESTART_COUNTDOWN_SECONDS,
                    reason: cause.to_string(),
                });
            }
            RestartDecision::Kernel(cause) => {
                tracing::warn!(cause = %cause, "Watchdog restarting kernel");
                self.bus.execute(&RestartMineCommand::default());
            }
        }
    }

    /// Evaluate and act on one tick.
    pub fn tick(&self, born_on: DateTime<Utc>) -> Option<RestartDecision> {
        let decision = self.evaluate(born_on)?;
        self.act(decision);
        Some(decision)
    }

    /// Subscribe to mine-started and 20-second tick events.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::Internal` if registration fails.
    pub fn attach(self: &Arc<Self>) -> Result<PathGroup> {
        let group = self.bus.new_group();
        let bus_err = |e: hashfleet_bus::BusError| MinerError::Internal(e.to_string());

        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus
            .register_event_path::<MineStartedEvent, _>(
                PathOptions::new("reset watchdog share baseline").group(group),
                move |event| {
                    if let Some(watchdog) = weak.upgrade() {
                        watchdog.on_mine_started(&event.context);
                    }
                },
            )
            .map_err(bus_err)?;

        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus
            .register_event_path::<Per20SecondEvent, _>(
                PathOptions::new("watchdog evaluation")
                    .log_level(hashfleet_bus::LogLevel::None)
                    .group(group),
                move |event| {
                    if let Some(watchdog) = weak.upgrade() {
                        let _ = watchdog.tick(event.born_on);
                    }
                },
            )
            .map_err(bus_err)?;

        Ok(group)
    }
}

impl fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchdog")
            .field("process_started_on", &self.process_started_on)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::fixtures;
    use crate::mock::MockMiningProbe;
    use crate::profile::{LowSpeedSettings, MinerProfile};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        watchdog: Arc<Watchdog>,
        probe: Arc<MockMiningProbe>,
        shares: Arc<CoinShareSet>,
        speeds: Arc<SpeedSet>,
        bus: Arc<MessageBus>,
        t0: DateTime<Utc>,
    }

    fn setup(profile: MinerProfile) -> Harness {
        let t0 = Utc::now();
        let probe = Arc::new(MockMiningProbe::new(profile));
        probe.set_autostart(true);
        let shares = Arc::new(CoinShareSet::new());
        let speeds = Arc::new(SpeedSet::new(t0));
        let bus = Arc::new(MessageBus::new());
        let watchdog = Arc::new(Watchdog::new(
            Arc::clone(&probe) as Arc<dyn MiningProbe>,
            Arc::clone(&shares),
            Arc::clone(&speeds),
            Arc::clone(&bus),
            t0,
        ));
        Harness {
            watchdog,
            probe,
            shares,
            speeds,
            bus,
            t0,
        }
    }

    fn mine(h: &Harness) -> Arc<MineContext> {
        let ctx = Arc::new(MineContext::started_for_test(fixtures::spec(), h.t0));
        h.probe.set_context(Some(Arc::clone(&ctx)));
        h.watchdog.on_mine_started(&ctx);
        ctx
    }

    fn at(h: &Harness, minutes: i64, seconds: i64) -> DateTime<Utc> {
        h.t0 + Duration::minutes(minutes) + Duration::seconds(seconds)
    }

    fn no_share_kernel(minutes: u32) -> MinerProfile {
        let mut profile = MinerProfile::default();
        profile.watchdog.no_share_restart_kernel = true;
        profile.watchdog.no_share_restart_kernel_minutes = minutes;
        profile
    }

    #[test]
    fn no_share_restarts_kernel_after_window() {
        let h = setup(no_share_kernel(5));
        mine(&h);

        assert_eq!(h.watchdog.evaluate(at(&h, 4, 40)), None);
        assert_eq!(
            h.watchdog.evaluate(at(&h, 6, 0)),
            Some(RestartDecision::Kernel(RestartCause::NoShare { minutes: 5 }))
        );
    }

    #[test]
    fn new_shares_push_the_window_out() {
        let h = setup(no_share_kernel(5));
        let ctx = mine(&h);

        h.shares
            .set_totals(ctx.spec().main.coin_id, 4, 0, at(&h, 3, 0));
        assert_eq!(h.watchdog.evaluate(at(&h, 3, 0)), None);

        let mut t = at(&h, 3, 20);
        while t < at(&h, 8, 0) {
            assert_eq!(h.watchdog.evaluate(t), None, "fired at {t}");
            t += Duration::seconds(20);
        }
        assert!(h.watchdog.evaluate(at(&h, 8, 20)).is_some());
    }

    #[test]
    fn no_share_needs_a_long_enough_session() {
        let h = setup(no_share_kernel(5));
        let ctx = Arc::new(MineContext::started_for_test(fixtures::spec(), h.t0));
        h.probe.set_context(Some(Arc::clone(&ctx)));
        h.watchdog.on_mine_started(&ctx);

        // An in-place restart keeps the baseline but resets the session.
        ctx.mark_restarted(at(&h, 4, 0));
        h.watchdog.on_mine_started(&ctx);

        assert_eq!(h.watchdog.evaluate(at(&h, 6, 0)), None);
        assert!(h.watchdog.evaluate(at(&h, 9, 20)).is_some());
    }

    #[test]
    fn no_share_computer_wins_over_kernel() {
        let mut profile = no_share_kernel(5);
        profile.watchdog.no_share_restart_computer = true;
        profile.watchdog.no_share_restart_computer_minutes = 5;
        let h = setup(profile);
        mine(&h);

        assert_eq!(
            h.watchdog.evaluate(at(&h, 6, 0)),
            Some(RestartDecision::Computer(RestartCause::NoShare { minutes: 5 }))
        );
    }

    #[test]
    fn idle_node_only_checks_uptime() {
        let mut profile = no_share_kernel(5);
        profile.watchdog.periodic_restart_kernel = true;
        profile.watchdog.periodic_restart_kernel_minutes = 1;
        let h = setup(profile);

        assert_eq!(h.watchdog.evaluate(at(&h, 30, 0)), None);

        let mut profile = h.probe.profile();
        profile.watchdog.periodic_restart_computer = true;
        profile.watchdog.periodic_restart_computer_hours = 0;
        profile.watchdog.periodic_restart_computer_minutes = 20;
        h.probe.set_profile(profile);

        assert_eq!(
            h.watchdog.evaluate(at(&h, 30, 0)),
            Some(RestartDecision::Computer(RestartCause::PeriodicComputer {
                minutes: 20
            }))
        );
    }

    #[test]
    fn periodic_kernel_uses_session_start() {
        let mut profile = MinerProfile::default();
        profile.watchdog.periodic_restart_kernel = true;
        profile.watchdog.periodic_restart_kernel_hours = 1;
        let h = setup(profile);
        mine(&h);

        assert_eq!(h.watchdog.evaluate(at(&h, 60, 0)), None);
        assert_eq!(
            h.watchdog.evaluate(at(&h, 60, 20)),
            Some(RestartDecision::Kernel(RestartCause::PeriodicKernel {
                minutes: 60
            }))
        );
    }

    #[test]
    fn periodic_computer_beats_periodic_kernel() {
        let mut profile = MinerProfile::default();
        profile.watchdog.periodic_restart_kernel = true;
        profile.watchdog.periodic_restart_kernel_minutes = 10;
        profile.watchdog.periodic_restart_computer = true;
        profile.watchdog.periodic_restart_computer_minutes = 10;
        let h = setup(profile);
        mine(&h);

        assert!(matches!(
            h.watchdog.evaluate(at(&h, 11, 0)),
            Some(RestartDecision::Computer(RestartCause::PeriodicComputer { .. }))
        ));
    }

    fn low_speed_profile() -> MinerProfile {
        let mut profile = MinerProfile::default();
        let coin_id = fixtures::spec().main.coin_id;
        profile.coin_id = coin_id;
        profile.coin_profile_mut(coin_id).low_speed = LowSpeedSettings {
            enabled: true,
            low_speed: 100.0,
            minutes: 5,
        };
        profile
    }

    #[test]
    fn low_speed_restarts_computer() {
        let h = setup(low_speed_profile());
        mine(&h);

        h.speeds.update(150.0, at(&h, 1, 0));
        assert_eq!(h.watchdog.evaluate(at(&h, 1, 0)), None);

        h.speeds.update(20.0, at(&h, 2, 0));
        assert_eq!(h.watchdog.evaluate(at(&h, 5, 40)), None);
        assert_eq!(
            h.watchdog.evaluate(at(&h, 6, 20)),
            Some(RestartDecision::Computer(RestartCause::LowSpeed { minutes: 5 }))
        );
    }

    #[test]
    fn stale_speed_does_not_count_as_high() {
        let h = setup(low_speed_profile());
        mine(&h);

        // A good sample that is never refreshed stops holding the timer open.
        h.speeds.update(150.0, at(&h, 0, 0));
        assert_eq!(h.watchdog.evaluate(at(&h, 5, 0)), None);
        assert_eq!(h.watchdog.evaluate(at(&h, 9, 40)), None);
        assert!(h.watchdog.evaluate(at(&h, 10, 20)).is_some());
    }

    #[test]
    fn machine_restart_latches() {
        let mut profile = MinerProfile::default();
        profile.watchdog.periodic_restart_computer = true;
        profile.watchdog.periodic_restart_computer_hours = 1;
        let h = setup(profile);

        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        h.bus
            .register_command_path::<RestartComputerCommand, _>(
                PathOptions::new("count"),
                move |cmd| {
                    assert_eq!(cmd.countdown_seconds, RESTART_COUNTDOWN_SECONDS);
                    c.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();

        assert!(h.watchdog.tick(at(&h, 60, 0)).is_none());
        assert!(h.watchdog.tick(at(&h, 60, 20)).is_some());
        assert!(h.watchdog.tick(at(&h, 60, 40)).is_none());
        assert!(h.watchdog.tick(at(&h, 90, 0)).is_none());
        assert!(h.watchdog.machine_restart_requested());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn acting_ensures_autostart() {
        let h = setup(no_share_kernel(5));
        h.probe.set_autostart(false);
        mine(&h);

        let order = Arc::new(Mutex::new(Vec::new()));
        let o = Arc::clone(&order);
        h.bus
            .register_command_path::<SetAutoStartCommand, _>(PathOptions::new("autostart"), move |cmd| {
                assert!(cmd.auto_boot && cmd.auto_start);
                o.lock().push("autostart");
            })
            .unwrap();
        let o = Arc::clone(&order);
        h.bus
            .register_command_path::<RestartMineCommand, _>(PathOptions::new("restart"), move |cmd| {
                assert!(cmd.work_type.is_none());
                o.lock().push("restart");
            })
            .unwrap();

        assert!(h.watchdog.tick(at(&h, 6, 0)).is_some());
        assert_eq!(*order.lock(), vec!["autostart", "restart"]);
    }

    #[test]
    fn events_drive_the_watchdog() {
        let h = setup(no_share_kernel(5));
        h.watchdog.attach().unwrap();

        let restarts = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&restarts);
        h.bus
            .register_command_path::<RestartMineCommand, _>(PathOptions::new("restart"), move |_| {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let ctx = Arc::new(MineContext::started_for_test(fixtures::spec(), h.t0));
        h.probe.set_context(Some(Arc::clone(&ctx)));
        h.bus.raise_event(&MineStartedEvent {
            context: Arc::clone(&ctx),
        });
        h.bus.raise_event(&Per20SecondEvent::new(at(&h, 6, 0)));

        assert_eq!(restarts.load(Ordering::SeqCst), 1);
    }
}
