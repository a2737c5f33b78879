//! Share and hash-rate counters.
//!
//! Written through a [`StatsFeed`] from kernel stats reports; read by the
//! watchdog.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hashfleet_core::{CoinId, CoinStatsReport, KernelStatsReport};
use parking_lot::RwLock;

use crate::context::MineContext;
use crate::error::{MinerError, Result};

/// Share counters for one coin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoinShare {
    /// Accepted shares since the kernel started.
    pub accepted: u64,
    /// Rejected shares since the kernel started.
    pub rejected: u64,
    /// Time of the last change.
    pub updated_on: Option<DateTime<Utc>>,
}

impl CoinShare {
    /// Accepted plus rejected.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.accepted + self.rejected
    }

    /// Rejected share percentage, 0 when nothing was submitted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn reject_percent(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.rejected as f64 * 100.0 / self.total() as f64
        }
    }
}

/// Share counters for every coin.
#[derive(Debug, Default)]
pub struct CoinShareSet {
    shares: RwLock<HashMap<CoinId, CoinShare>>,
}

impl CoinShareSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for a coin; zero when never reported.
    #[must_use]
    pub fn get(&self, coin_id: &CoinId) -> CoinShare {
        self.shares.read().get(coin_id).copied().unwrap_or_default()
    }

    /// Add accepted shares.
    pub fn add_accepted(&self, coin_id: CoinId, count: u64, at: DateTime<Utc>) {
        let mut shares = self.shares.write();
        let entry = shares.entry(coin_id).or_default();
        entry.accepted += count;
        entry.updated_on = Some(at);
    }

    /// Add rejected shares.
    pub fn add_rejected(&self, coin_id: CoinId, count: u64, at: DateTime<Utc>) {
        let mut shares = self.shares.write();
        let entry = shares.entry(coin_id).or_default();
        entry.rejected += count;
        entry.updated_on = Some(at);
    }

    /// Replace a coin's counters with absolute totals.
    pub fn set_totals(&self, coin_id: CoinId, accepted: u64, rejected: u64, at: DateTime<Utc>) {
        self.shares.write().insert(
            coin_id,
            CoinShare {
                accepted,
                rejected,
                updated_on: Some(at),
            },
        );
    }

    /// Forget every counter.
    pub fn reset(&self) {
        self.shares.write().clear();
    }
}

/// A hash-rate sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    /// Hashes per second.
    pub value: f64,
    /// When the sample was taken.
    pub speed_on: DateTime<Utc>,
}

/// Latest total main-coin hash rate.
#[derive(Debug)]
pub struct SpeedSet {
    main: RwLock<SpeedSample>,
}

impl SpeedSet {
    /// A set with a zero sample taken at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            main: RwLock::new(SpeedSample {
                value: 0.0,
                speed_on: now,
            }),
        }
    }

    /// Record a new total main-coin rate.
    pub fn update(&self, value: f64, at: DateTime<Utc>) {
        *self.main.write() = SpeedSample {
            value,
            speed_on: at,
        };
    }

    /// The latest sample.
    #[must_use]
    pub fn current(&self) -> SpeedSample {
        *self.main.read()
    }
}

impl Default for SpeedSet {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// Writes kernel stats reports into the share and speed sets.
#[derive(Debug, Clone)]
pub struct StatsFeed {
    shares: Arc<CoinShareSet>,
    speeds: Arc<SpeedSet>,
}

impl StatsFeed {
    /// Create a feed writing into `shares` and `speeds`.
    #[must_use]
    pub const fn new(shares: Arc<CoinShareSet>, speeds: Arc<SpeedSet>) -> Self {
        Self { shares, speeds }
    }

    /// Record a report from the kernel running `context`.
    ///
    /// Share counts are totals since the kernel started and replace the
    /// previous ones. The main-coin speed becomes the current sample.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::InvalidStats` for a negative or non-finite speed,
    /// or a dual-coin report for a single-coin run.
    pub fn record(
        &self,
        context: &MineContext,
        report: &KernelStatsReport,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let spec = context.spec();
        check_speed(&report.main)?;
        let dual = match (&spec.dual, &report.dual) {
            (Some(selection), Some(stats)) => {
                check_speed(stats)?;
                Some((selection.coin_id, stats))
            }
            (None, Some(_)) => {
                return Err(MinerError::InvalidStats(
                    "dual coin stats for a single coin run".into(),
                ))
            }
            (_, None) => None,
        };

        let main = &report.main;
        self.shares
            .set_totals(spec.main.coin_id, main.accepted_shares, main.rejected_shares, at);
        self.speeds.update(main.speed, at);
        if let Some((coin_id, stats)) = dual {
            self.shares
                .set_totals(coin_id, stats.accepted_shares, stats.rejected_shares, at);
        }
        tracing::trace!(
            context_id = %context.id(),
            speed = main.speed,
            accepted = main.accepted_shares,
            "Kernel stats recorded"
        );
        Ok(())
    }
}

fn check_speed(stats: &CoinStatsReport) -> Result<()> {
    if stats.speed.is_finite() && stats.speed >= 0.0 {
        Ok(())
    } else {
        Err(MinerError::InvalidStats(format!("bad speed {}", stats.speed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::fixtures;

    #[test]
    fn counters_accumulate_per_coin() {
        let set = CoinShareSet::new();
        let a = CoinId::generate();
        let b = CoinId::generate();
        let now = Utc::now();

        set.add_accepted(a, 3, now);
        set.add_accepted(a, 2, now);
        set.add_rejected(a, 1, now);
        set.add_accepted(b, 7, now);

        assert_eq!(set.get(&a).accepted, 5);
        assert_eq!(set.get(&a).total(), 6);
        assert_eq!(set.get(&b).accepted, 7);
        assert_eq!(set.get(&CoinId::generate()), CoinShare::default());
    }

    #[test]
    fn reject_percent() {
        let share = CoinShare {
            accepted: 3,
            rejected: 1,
            updated_on: None,
        };
        assert!((share.reject_percent() - 25.0).abs() < f64::EPSILON);
        assert!(CoinShare::default().reject_percent().abs() < f64::EPSILON);
    }

    #[test]
    fn speed_update_replaces_sample() {
        let t0 = Utc::now();
        let set = SpeedSet::new(t0);
        let t1 = t0 + chrono::Duration::seconds(10);
        set.update(42.5e6, t1);
        assert_eq!(set.current().speed_on, t1);
        assert!((set.current().value - 42.5e6).abs() < 1.0);
    }

    fn report(speed: f64, accepted: u64) -> KernelStatsReport {
        KernelStatsReport {
            main: CoinStatsReport {
                speed,
                accepted_shares: accepted,
                rejected_shares: 1,
            },
            dual: None,
        }
    }

    #[test]
    fn feed_replaces_totals_and_speed() {
        let t0 = Utc::now();
        let (shares, speeds) = (Arc::new(CoinShareSet::new()), Arc::new(SpeedSet::new(t0)));
        let feed = StatsFeed::new(Arc::clone(&shares), Arc::clone(&speeds));
        let ctx = MineContext::new(fixtures::spec(), t0);
        let coin_id = ctx.spec().main.coin_id;

        feed.record(&ctx, &report(30e6, 4), t0).unwrap();
        feed.record(&ctx, &report(32e6, 9), t0).unwrap();

        assert_eq!(shares.get(&coin_id).accepted, 9);
        assert_eq!(shares.get(&coin_id).total(), 10);
        assert!((speeds.current().value - 32e6).abs() < 1.0);
    }

    #[test]
    fn feed_rejects_bad_reports() {
        let t0 = Utc::now();
        let (shares, speeds) = (Arc::new(CoinShareSet::new()), Arc::new(SpeedSet::new(t0)));
        let feed = StatsFeed::new(Arc::clone(&shares), speeds);
        let ctx = MineContext::new(fixtures::spec(), t0);

        assert!(matches!(
            feed.record(&ctx, &report(f64::NAN, 1), t0),
            Err(MinerError::InvalidStats(_))
        ));
        let mut dual = report(1.0, 1);
        dual.dual = Some(CoinStatsReport::default());
        assert!(matches!(
            feed.record(&ctx, &dual, t0),
            Err(MinerError::InvalidStats(_))
        ));
        assert_eq!(shares.get(&ctx.spec().main.coin_id).total(), 0);
    }
}
