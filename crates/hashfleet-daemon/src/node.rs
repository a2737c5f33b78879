//! Node assembly.
//!
//! A [`Node`] owns one bus and everything hanging off it: the mining
//! controller, the watchdog, the host command handlers and the operation
//! log shared with the HTTP surface.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hashfleet_bus::{seconds_delay, set_interval, LogLevel, MessageBus, PathGroup, PathOptions};
use hashfleet_miner::{
    CoinShareSet, KernelPackages, KernelRunner, MiningController, MiningProbe,
    RestartComputerCommand, SetAutoStartCommand, SpeedSet, StatsFeed, Watchdog, WorkFiles,
};
use hashfleet_store::SettingsStore;
use tokio::runtime::Handle;

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::host::HostOps;
use crate::operation::OperationResultSet;
use crate::state::NodeState;

/// A fully wired node.
pub struct Node {
    config: NodeConfig,
    bus: Arc<MessageBus>,
    controller: Arc<MiningController>,
    watchdog: Arc<Watchdog>,
    shares: Arc<CoinShareSet>,
    speeds: Arc<SpeedSet>,
    host: Arc<dyn HostOps>,
    operations: Arc<OperationResultSet>,
    work_files: WorkFiles,
}

impl Node {
    /// Build a node. Nothing is attached to the bus until [`start`](Self::start).
    #[must_use]
    pub fn new(
        config: NodeConfig,
        settings: Arc<dyn SettingsStore>,
        host: Arc<dyn HostOps>,
        packages: Arc<dyn KernelPackages>,
        runner: Arc<dyn KernelRunner>,
    ) -> Self {
        let bus = Arc::new(MessageBus::new());
        let work_files = WorkFiles::new(&config.data_dir);
        let controller = Arc::new(MiningController::new(
            Arc::clone(&bus),
            settings,
            packages,
            runner,
            config.gpus(),
            work_files.clone(),
        ));

        let now = Utc::now();
        let shares = Arc::new(CoinShareSet::new());
        let speeds = Arc::new(SpeedSet::new(now));
        let watchdog = Arc::new(Watchdog::new(
            Arc::clone(&controller) as Arc<dyn MiningProbe>,
            Arc::clone(&shares),
            Arc::clone(&speeds),
            Arc::clone(&bus),
            now,
        ));
        let operations = Arc::new(OperationResultSet::new(config.operation_result_capacity));

        Self {
            config,
            bus,
            controller,
            watchdog,
            shares,
            speeds,
            host,
            operations,
            work_files,
        }
    }

    /// The node's bus.
    #[must_use]
    pub fn bus(&self) -> Arc<MessageBus> {
        Arc::clone(&self.bus)
    }

    /// The mining controller.
    #[must_use]
    pub fn controller(&self) -> Arc<MiningController> {
        Arc::clone(&self.controller)
    }

    /// The watchdog.
    #[must_use]
    pub fn watchdog(&self) -> Arc<Watchdog> {
        Arc::clone(&self.watchdog)
    }

    /// Share counters, fed by `POST /v1/stats`.
    #[must_use]
    pub fn shares(&self) -> Arc<CoinShareSet> {
        Arc::clone(&self.shares)
    }

    /// Speed samples, fed by `POST /v1/stats`.
    #[must_use]
    pub fn speeds(&self) -> Arc<SpeedSet> {
        Arc::clone(&self.speeds)
    }

    /// The operation log.
    #[must_use]
    pub fn operations(&self) -> Arc<OperationResultSet> {
        Arc::clone(&self.operations)
    }

    /// State for the HTTP surface.
    #[must_use]
    pub fn state(&self) -> NodeState {
        NodeState {
            controller: Arc::clone(&self.controller),
            host: Arc::clone(&self.host),
            work_files: self.work_files.clone(),
            operations: Arc::clone(&self.operations),
            stats: StatsFeed::new(Arc::clone(&self.shares), Arc::clone(&self.speeds)),
            config: self.config.clone(),
        }
    }

    /// Load persisted work, attach every handler and schedule autostart.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted work cannot be loaded or a handler
    /// cannot be registered.
    pub async fn start(&self) -> Result<()> {
        self.controller.init().await?;
        self.controller.attach()?;
        self.watchdog.attach()?;
        self.attach_host_commands()?;
        self.schedule_autostart()?;
        tracing::info!(
            gpus = self.controller.gpus().len(),
            work_type = ?self.controller.work_type(),
            "Node started"
        );
        Ok(())
    }

    /// Handle `RestartComputerCommand` and `SetAutoStartCommand`.
    ///
    /// # Errors
    ///
    /// Returns an error outside a tokio runtime or if registration fails.
    pub fn attach_host_commands(&self) -> Result<PathGroup> {
        let runtime = Handle::try_current()
            .map_err(|e| NodeError::Host(format!("no tokio runtime: {e}")))?;
        let group = self.bus.new_group();

        let pending = Arc::new(AtomicBool::new(false));
        let (host, operations, rt) = (
            Arc::clone(&self.host),
            Arc::clone(&self.operations),
            runtime.clone(),
        );
        self.bus.register_command_path::<RestartComputerCommand, _>(
            PathOptions::new("restart computer")
                .log_level(LogLevel::Info)
                .group(group),
            move |cmd| {
                if pending.swap(true, Ordering::AcqRel) {
                    tracing::warn!("Computer restart already pending");
                    return;
                }
                let _enter = rt.enter();
                schedule_restart(
                    cmd,
                    Arc::clone(&host),
                    Arc::clone(&operations),
                    Arc::clone(&pending),
                );
            },
        )?;

        let weak = Arc::downgrade(&self.controller);
        let host = Arc::clone(&self.host);
        self.bus.register_command_path::<SetAutoStartCommand, _>(
            PathOptions::new("set autostart")
                .log_level(LogLevel::Info)
                .group(group),
            move |cmd| {
                let Some(controller) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = controller.set_auto_start(cmd.auto_boot, cmd.auto_start) {
                    tracing::error!(error = %e, "Failed to save autostart settings");
                }
                let (host, auto_boot) = (Arc::clone(&host), cmd.auto_boot);
                runtime.spawn(async move {
                    if let Err(e) = host.set_auto_boot(auto_boot).await {
                        tracing::warn!(error = %e, "Boot registration failed");
                    }
                });
            },
        )?;

        Ok(group)
    }

    /// Start mining after the configured delay if autostart is on.
    ///
    /// Returns whether a start was scheduled.
    ///
    /// # Errors
    ///
    /// Returns an error outside a tokio runtime or if registration fails.
    pub fn schedule_autostart(&self) -> Result<bool> {
        if !self.controller.autostart_configured() {
            return Ok(false);
        }
        let runtime = Handle::try_current()
            .map_err(|e| NodeError::Host(format!("no tokio runtime: {e}")))?;
        let controller = Arc::clone(&self.controller);
        let delay = self.config.autostart_delay_seconds;
        tracing::info!(delay_seconds = delay, "Autostart scheduled");
        seconds_delay(&self.bus, delay, move || {
            runtime.spawn(async move {
                let _ = controller.start_mine(false).await;
            });
        })?;
        Ok(true)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("config", &self.config)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

/// Count down one line per second, then ask the host to reboot.
fn schedule_restart(
    cmd: &RestartComputerCommand,
    host: Arc<dyn HostOps>,
    operations: Arc<OperationResultSet>,
    pending: Arc<AtomicBool>,
) {
    let countdown = cmd.countdown_seconds;
    let reason = cmd.reason.clone();
    tracing::warn!(countdown, reason = %reason, "Computer restart scheduled");

    let elapsed = AtomicU32::new(0);
    set_interval(
        Duration::from_secs(1),
        move || {
            let seconds = countdown.saturating_sub(elapsed.fetch_add(1, Ordering::AcqRel) + 1);
            tracing::warn!(seconds, "Restarting computer");
        },
        move || {
            tokio::spawn(async move {
                let result = host.restart_computer(&reason).await;
                match result {
                    Ok(()) => {
                        operations.record("restart_computer", 200, reason);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Computer restart failed");
                        operations.record("restart_computer", 500, e.to_string());
                        pending.store(false, Ordering::Release);
                    }
                }
            });
        },
        Some(Duration::from_secs(u64::from(countdown))),
        || false,
    );
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use hashfleet_core::{CoinId, CoinKernelId, GpuType, KernelId, PoolId};
    use hashfleet_miner::catalog::{KernelInput, KernelOutput};
    use hashfleet_miner::mock::{MockKernelPackages, MockKernelRunner};
    use hashfleet_miner::profile::{CoinKernelProfile, CoinProfile};
    use hashfleet_miner::{Catalog, Coin, CoinKernel, Kernel, MinerProfile, Pool};
    use hashfleet_store::mock::MemorySettingsStore;

    use super::*;
    use crate::mock::RecordingHostOps;

    pub const PACKAGE: &str = "trex-0.26.8.zip";

    /// A profile and catalog that start cleanly on Nvidia.
    pub fn work() -> (MinerProfile, Catalog) {
        let coin = Coin {
            id: CoinId::generate(),
            code: "RVN".into(),
            algo: "kawpow".into(),
            test_wallet: None,
        };
        let pool = Pool {
            id: PoolId::generate(),
            coin_id: coin.id,
            name: "rvn-pool".into(),
            server: "stratum+tcp://rvn.pool:3333".into(),
            is_user_mode: false,
        };
        let kernel = Kernel {
            id: KernelId::generate(),
            code: "trex".into(),
            version: "0.26.8".into(),
            package: PACKAGE.into(),
            command_name: "t-rex".into(),
            input: Some(KernelInput {
                args: "-o {pool} -u {wallet}.{worker} -d {devices}".into(),
                dual_args: String::new(),
            }),
            output: Some(KernelOutput {
                parser: "trex".into(),
            }),
        };
        let coin_kernel = CoinKernel {
            id: CoinKernelId::generate(),
            coin_id: coin.id,
            kernel_id: kernel.id,
            args: "-a kawpow".into(),
            supported_gpus: vec![GpuType::Nvidia],
        };

        let mut profile = MinerProfile {
            coin_id: coin.id,
            worker_name: "rack3-07".into(),
            ..MinerProfile::default()
        };
        profile.coins.insert(
            coin.id,
            CoinProfile {
                pool_id: pool.id,
                wallet: "RVNwallet".into(),
                coin_kernel_id: coin_kernel.id,
                ..CoinProfile::default()
            },
        );
        profile
            .coin_kernels
            .insert(coin_kernel.id, CoinKernelProfile::default());

        let catalog = Catalog {
            coins: vec![coin],
            pools: vec![pool],
            kernels: vec![kernel],
            coin_kernels: vec![coin_kernel],
        };
        (profile, catalog)
    }

    pub struct Harness {
        pub node: Node,
        pub host: Arc<RecordingHostOps>,
        pub runner: Arc<MockKernelRunner>,
        pub settings: Arc<MemorySettingsStore>,
    }

    /// A node on Nvidia with a valid own profile and every package present.
    pub fn harness(dir: &Path) -> Harness {
        harness_with(dir, Arc::new(MemorySettingsStore::new()))
    }

    pub fn harness_with(dir: &Path, settings: Arc<MemorySettingsStore>) -> Harness {
        let config = NodeConfig {
            data_dir: dir.to_path_buf(),
            gpu_type: GpuType::Nvidia,
            gpu_count: 4,
            gpu_name: "RTX 3080".into(),
            autostart_delay_seconds: 2,
            ..NodeConfig::default()
        };
        let host = Arc::new(RecordingHostOps::new());
        let runner = Arc::new(MockKernelRunner::new());
        let node = Node::new(
            config,
            Arc::clone(&settings) as Arc<dyn SettingsStore>,
            Arc::clone(&host) as Arc<dyn HostOps>,
            Arc::new(MockKernelPackages::with_present(&[PACKAGE])),
            Arc::clone(&runner) as Arc<dyn KernelRunner>,
        );
        let (profile, catalog) = work();
        node.controller().set_profile(profile);
        node.controller().set_catalog(catalog);
        Harness {
            node,
            host,
            runner,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use hashfleet_bus::Per1SecondEvent;
    use hashfleet_store::keys;
    use hashfleet_store::mock::MemorySettingsStore;
    use hashfleet_store::SettingsExt;
    use tempfile::TempDir;

    use super::fixtures::{harness, harness_with};
    use super::*;

    async fn wait_for(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(30), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_computer_waits_for_countdown() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path());
        h.node.start().await.unwrap();

        h.node.bus().execute(&RestartComputerCommand {
            countdown_seconds: 3,
            reason: "no share for 5 minutes".into(),
        });
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(h.host.calls().is_empty());

        wait_for(|| !h.host.calls().is_empty()).await;
        assert_eq!(h.host.calls(), vec!["restart_computer:no share for 5 minutes"]);
        assert_eq!(h.node.operations().after(0)[0].operation, "restart_computer");
    }

    #[tokio::test(start_paused = true)]
    async fn second_restart_request_is_ignored() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path());
        h.node.start().await.unwrap();

        for _ in 0..2 {
            h.node.bus().execute(&RestartComputerCommand {
                countdown_seconds: 1,
                reason: "periodic".into(),
            });
        }
        wait_for(|| !h.host.calls().is_empty()).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.host.calls().len(), 1);
    }

    #[tokio::test]
    async fn set_auto_start_command_persists_and_registers_boot() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path());
        h.node.start().await.unwrap();
        assert!(!h.node.controller().autostart_configured());

        h.node.bus().execute(&SetAutoStartCommand {
            auto_boot: true,
            auto_start: true,
        });

        assert!(h.node.controller().autostart_configured());
        wait_for(|| h.host.calls().contains(&"set_auto_boot:true".to_string())).await;
    }

    #[tokio::test]
    async fn autostart_starts_mining_after_delay() {
        let dir = TempDir::new().unwrap();
        let settings = Arc::new(MemorySettingsStore::new());
        settings.put_setting(keys::AUTO_BOOT, &true).unwrap();
        settings.put_setting(keys::AUTO_START, &true).unwrap();
        let h = harness_with(dir.path(), settings);
        h.node.start().await.unwrap();

        let bus = h.node.bus();
        bus.raise_event(&Per1SecondEvent::new(Utc::now()));
        assert!(!h.node.controller().is_mining());
        bus.raise_event(&Per1SecondEvent::new(Utc::now()));

        let controller = h.node.controller();
        wait_for(|| controller.is_mining()).await;
        assert_eq!(h.runner.launched().len(), 1);
    }

    #[tokio::test]
    async fn no_autostart_without_settings() {
        let dir = TempDir::new().unwrap();
        let h = harness(dir.path());
        assert!(!h.node.schedule_autostart().unwrap());
        assert!(h.settings.setting_keys().unwrap().is_empty());
    }
}
