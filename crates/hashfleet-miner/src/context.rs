//! Mining contexts.
//!
//! A [`MineContext`] is one mining run: the resolved configuration it was
//! started with plus a small runtime record. Contexts are shared as
//! `Arc<MineContext>`; everything outside the controller only reads them.

use chrono::{DateTime, Utc};
use hashfleet_core::{CoinId, CoinKernelId, ContextId, PoolId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::catalog::Kernel;

/// A resolved coin/pool/wallet triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinSelection {
    /// The coin.
    pub coin_id: CoinId,
    /// The coin's ticker code.
    pub coin_code: String,
    /// The pool.
    pub pool_id: PoolId,
    /// The pool's stratum endpoint.
    pub pool_server: String,
    /// Wallet address, empty for account-mode pools.
    pub wallet: String,
    /// Pool account name, empty for wallet-mode pools.
    pub user_name: String,
}

/// Everything a kernel launch needs, resolved and validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineSpec {
    /// Worker name reported to pools.
    pub worker_name: String,
    /// Main coin.
    pub main: CoinSelection,
    /// Dual coin, when dual mining.
    pub dual: Option<CoinSelection>,
    /// The kernel to run.
    pub kernel: Kernel,
    /// The coin/kernel binding.
    pub coin_kernel_id: CoinKernelId,
    /// Device indices in use.
    pub gpu_indices: Vec<u32>,
    /// Arguments passed to the kernel executable.
    pub command_line: String,
}

#[derive(Debug, Default)]
struct Runtime {
    started_on: Option<DateTime<Utc>>,
    is_restart: bool,
    restart_count: u32,
    closed: bool,
}

/// One mining run.
#[derive(Debug)]
pub struct MineContext {
    id: ContextId,
    spec: MineSpec,
    created_on: DateTime<Utc>,
    runtime: RwLock<Runtime>,
}

impl MineContext {
    /// Create a context that has not started yet.
    #[must_use]
    pub fn new(spec: MineSpec, created_on: DateTime<Utc>) -> Self {
        Self {
            id: ContextId::generate(),
            spec,
            created_on,
            runtime: RwLock::new(Runtime::default()),
        }
    }

    /// Context identifier.
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    /// The resolved configuration.
    #[must_use]
    pub const fn spec(&self) -> &MineSpec {
        &self.spec
    }

    /// When the context was created.
    #[must_use]
    pub const fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }

    /// When the kernel was last (re)started.
    #[must_use]
    pub fn started_on(&self) -> Option<DateTime<Utc>> {
        self.runtime.read().started_on
    }

    /// True if the last start was an in-place restart.
    #[must_use]
    pub fn is_restart(&self) -> bool {
        self.runtime.read().is_restart
    }

    /// Number of in-place restarts.
    #[must_use]
    pub fn restart_count(&self) -> u32 {
        self.runtime.read().restart_count
    }

    /// True once the context has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.runtime.read().closed
    }

    /// True if dual mining.
    #[must_use]
    pub const fn is_dual(&self) -> bool {
        self.spec.dual.is_some()
    }

    pub(crate) fn mark_started(&self, at: DateTime<Utc>) {
        let mut rt = self.runtime.write();
        rt.started_on = Some(at);
        rt.is_restart = false;
    }

    pub(crate) fn mark_restarted(&self, at: DateTime<Utc>) {
        let mut rt = self.runtime.write();
        rt.started_on = Some(at);
        rt.is_restart = true;
        rt.restart_count += 1;
    }

    pub(crate) fn close(&self) {
        self.runtime.write().closed = true;
    }

    /// A serializable snapshot for reporting.
    #[must_use]
    pub fn summary(&self) -> ContextSummary {
        let rt = self.runtime.read();
        ContextSummary {
            id: self.id,
            main_coin: self.spec.main.coin_code.clone(),
            dual_coin: self.spec.dual.as_ref().map(|d| d.coin_code.clone()),
            kernel: self.spec.kernel.full_name(),
            gpu_indices: self.spec.gpu_indices.clone(),
            created_on: self.created_on,
            started_on: rt.started_on,
            restart_count: rt.restart_count,
        }
    }

    /// Test-only: a context started at `started_on`.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn started_for_test(spec: MineSpec, started_on: DateTime<Utc>) -> Self {
        let ctx = Self::new(spec, started_on);
        ctx.mark_started(started_on);
        ctx
    }
}

/// Reporting view of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSummary {
    /// Context identifier.
    pub id: ContextId,
    /// Main coin code.
    pub main_coin: String,
    /// Dual coin code.
    pub dual_coin: Option<String>,
    /// Kernel name.
    pub kernel: String,
    /// Device indices.
    pub gpu_indices: Vec<u32>,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Last start time.
    pub started_on: Option<DateTime<Utc>>,
    /// In-place restarts.
    pub restart_count: u32,
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn restart_bumps_counter_and_start_time() {
        let t0 = Utc::now();
        let ctx = MineContext::new(fixtures::spec(), t0);
        assert_eq!(ctx.started_on(), None);

        ctx.mark_started(t0);
        assert!(!ctx.is_restart());

        let t1 = t0 + Duration::minutes(5);
        ctx.mark_restarted(t1);
        assert!(ctx.is_restart());
        assert_eq!(ctx.restart_count(), 1);
        assert_eq!(ctx.started_on(), Some(t1));
        assert_eq!(ctx.created_on(), t0);
    }

    #[test]
    fn summary_reflects_runtime() {
        let ctx = MineContext::started_for_test(fixtures::spec(), Utc::now());
        ctx.close();
        let summary = ctx.summary();
        assert_eq!(summary.main_coin, "ETC");
        assert_eq!(summary.kernel, "gminer-2.75");
        assert!(summary.started_on.is_some());
        assert!(ctx.is_closed());
    }
}
