//! The mining lifecycle controller.
//!
//! [`MiningController`] owns the node's single locked [`MineContext`]. All
//! start, stop and restart operations are serialized through one async
//! operation lock; state reads go through a short-lived sync lock and never
//! wait on an operation.
//!
//! Validation failures never surface as errors. They are raised as
//! [`StartingMineFailedEvent`] and returned as [`StartOutcome::Failed`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use chrono::Utc;
use futures::FutureExt;
use hashfleet_bus::{MessageBus, PathGroup, PathOptions, LogLevel};
use hashfleet_core::WorkType;
use hashfleet_store::{keys, SettingsExt, SettingsStore};
use parking_lot::{Mutex, RwLock};

use crate::catalog::Catalog;
use crate::context::MineContext;
use crate::error::{MinerError, Result, StartMineError};
use crate::events::{
    KernelExitedEvent, MineStartedEvent, MineStopReason, MineStoppedEvent, RestartMineCommand, StartMineCommand,
    StartingMineEvent, StartingMineFailedEvent, StopMineCommand,
};
use crate::gpus::GpuSet;
use crate::lifecycle::{self, MinePhase};
use crate::packages::KernelPackages;
use crate::profile::MinerProfile;
use crate::runner::KernelRunner;
use crate::validate::resolve_spec;
use crate::workspace::WorkFiles;

/// A kernel that exits within this many seconds of starting is not relaunched.
pub const DEFAULT_EXIT_GRACE_SECONDS: i64 = 60;

/// Read-only view of the node used by the watchdog.
pub trait MiningProbe: Send + Sync {
    /// The locked context, if mining.
    fn locked_context(&self) -> Option<Arc<MineContext>>;

    /// The active profile.
    fn profile(&self) -> MinerProfile;

    /// True if the node relaunches and resumes mining after a reboot.
    fn autostart_configured(&self) -> bool;
}

/// Result of a start request.
#[derive(Debug, Clone)]
#[must_use]
pub enum StartOutcome {
    /// The kernel is running under this context.
    Started(Arc<MineContext>),
    /// The start was refused or failed; the reason was also raised as an event.
    Failed(StartMineError),
}

impl StartOutcome {
    /// Returns true for `Started`.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }

    /// The failure reason, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&StartMineError> {
        match self {
            Self::Started(_) => None,
            Self::Failed(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    phase: MinePhase,
    locked: Option<Arc<MineContext>>,
    current: Option<Arc<MineContext>>,
}

impl ControllerState {
    fn transition(&mut self, to: MinePhase) {
        if let Err(e) = lifecycle::validate_transition(self.phase, to) {
            tracing::error!(error = %e, "Forcing unexpected phase transition");
        }
        tracing::debug!(from = ?self.phase, to = ?to, "Mine phase changed");
        self.phase = to;
    }
}

#[derive(Debug, Clone, Default)]
struct ConfigSet {
    profile: MinerProfile,
    catalog: Catalog,
}

#[derive(Debug, Clone, Default)]
struct WorkSelection {
    work_type: WorkType,
    worker_name: Option<String>,
}

/// Owns the mining lifecycle of a node.
pub struct MiningController {
    bus: Arc<MessageBus>,
    settings: Arc<dyn SettingsStore>,
    packages: Arc<dyn KernelPackages>,
    runner: Arc<dyn KernelRunner>,
    gpus: GpuSet,
    work_files: WorkFiles,
    state: Mutex<ControllerState>,
    op_lock: tokio::sync::Mutex<()>,
    own: RwLock<ConfigSet>,
    active: RwLock<ConfigSet>,
    work: RwLock<WorkSelection>,
    exit_grace: chrono::Duration,
}

impl MiningController {
    /// Create a controller. The persisted work mode is read from `settings`;
    /// call [`init`](Self::init) to load its files.
    #[must_use]
    pub fn new(
        bus: Arc<MessageBus>,
        settings: Arc<dyn SettingsStore>,
        packages: Arc<dyn KernelPackages>,
        runner: Arc<dyn KernelRunner>,
        gpus: GpuSet,
        work_files: WorkFiles,
    ) -> Self {
        let work = WorkSelection {
            work_type: settings.setting_or(keys::WORK_TYPE, WorkType::None),
            worker_name: settings.setting_or(keys::WORKER_NAME, None),
        };
        Self {
            bus,
            settings,
            packages,
            runner,
            gpus,
            work_files,
            state: Mutex::new(ControllerState::default()),
            op_lock: tokio::sync::Mutex::new(()),
            own: RwLock::new(ConfigSet::default()),
            active: RwLock::new(ConfigSet::default()),
            work: RwLock::new(work),
            exit_grace: chrono::Duration::seconds(DEFAULT_EXIT_GRACE_SECONDS),
        }
    }

    /// Set how long a kernel must have run before an unexpected exit is
    /// answered with a relaunch instead of a stop.
    #[must_use]
    pub fn with_exit_grace(mut self, grace: chrono::Duration) -> Self {
        self.exit_grace = grace;
        self
    }

    /// Load the work files of the persisted work mode, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the files exist but cannot be loaded.
    pub async fn init(&self) -> Result<()> {
        let work_type = self.work_type();
        if work_type.is_work() && self.work_files.missing(work_type).await.is_none() {
            self.reload_config(work_type).await?;
            tracing::info!(work_type = ?work_type, "Loaded persisted work");
        }
        Ok(())
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> MinePhase {
        self.state.lock().phase
    }

    /// True while a context is locked.
    #[must_use]
    pub fn is_mining(&self) -> bool {
        self.state.lock().locked.is_some()
    }

    /// The context being started or most recently started.
    #[must_use]
    pub fn current_context(&self) -> Option<Arc<MineContext>> {
        self.state.lock().current.clone()
    }

    /// The active catalog.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        self.active.read().catalog.clone()
    }

    /// The node's GPUs.
    #[must_use]
    pub const fn gpus(&self) -> &GpuSet {
        &self.gpus
    }

    /// The current work mode.
    #[must_use]
    pub fn work_type(&self) -> WorkType {
        self.work.read().work_type
    }

    /// Replace the node's own profile. Takes effect on the next start when
    /// not in a work mode.
    pub fn set_profile(&self, profile: MinerProfile) {
        self.own.write().profile = profile.clone();
        if !self.work_type().is_work() {
            self.active.write().profile = profile;
        }
    }

    /// Replace the node's own catalog. Takes effect on the next start when
    /// not in a work mode.
    pub fn set_catalog(&self, catalog: Catalog) {
        self.own.write().catalog = catalog.clone();
        if !self.work_type().is_work() {
            self.active.write().catalog = catalog;
        }
    }

    /// Persist the autostart flags.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::Store` if the settings cannot be written.
    pub fn set_auto_start(&self, auto_boot: bool, auto_start: bool) -> Result<()> {
        self.settings.put_setting(keys::AUTO_BOOT, &auto_boot)?;
        self.settings.put_setting(keys::AUTO_START, &auto_start)?;
        tracing::info!(auto_boot, auto_start, "Autostart settings saved");
        Ok(())
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Start mining.
    ///
    /// The profile is validated first; a refused start leaves any running
    /// context alone. With `is_restart`, a locked context whose resolved
    /// configuration is unchanged is relaunched in place and keeps its
    /// identity. Otherwise the locked context is stopped and a fresh one is
    /// started, downloading the kernel package first if needed.
    pub async fn start_mine(&self, is_restart: bool) -> StartOutcome {
        let _op = self.op_lock.lock().await;
        self.bus.raise_event(&StartingMineEvent { is_restart });

        let outcome = match AssertUnwindSafe(self.start_locked(is_restart))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "Start mine panicked");
                self.reset_to_idle().await;
                StartOutcome::Failed(StartMineError::Internal(message))
            }
        };

        if let StartOutcome::Failed(reason) = &outcome {
            tracing::warn!(reason = %reason, "Start mine failed");
            self.bus.raise_event(&StartingMineFailedEvent {
                reason: reason.to_string(),
            });
        }
        outcome
    }

    async fn start_locked(&self, is_restart: bool) -> StartOutcome {
        let config = self.active.read().clone();
        let worker_name = self.work.read().worker_name.clone();
        let spec = match resolve_spec(
            &config.profile,
            &config.catalog,
            &self.gpus,
            worker_name.as_deref(),
        ) {
            Ok(spec) => spec,
            Err(reason) => return StartOutcome::Failed(reason),
        };

        if let Some(context) = self.locked_context() {
            if is_restart && context.spec() == &spec {
                return self.restart_in_place(context).await;
            }
            let reason = if is_restart {
                tracing::info!(
                    context_id = %context.id(),
                    "Mining configuration changed, replacing context"
                );
                MineStopReason::InRestartMine
            } else {
                MineStopReason::InStartMine
            };
            self.stop_locked(reason).await;
        }
        self.state.lock().transition(MinePhase::Starting);

        let package = spec.kernel.package.clone();
        if !self.packages.is_present(&package).await {
            tracing::info!(
                kernel = %spec.kernel.full_name(),
                package = %package,
                "Kernel package not present, downloading"
            );
            if let Err(e) = self.packages.download(&package).await {
                self.state.lock().transition(MinePhase::Idle);
                return StartOutcome::Failed(StartMineError::DownloadFailed(detail(&e)));
            }
        }
        if let Err(e) = self.packages.prepare(&package).await {
            self.state.lock().transition(MinePhase::Idle);
            return StartOutcome::Failed(StartMineError::UnpackFailed(detail(&e)));
        }

        let context = Arc::new(MineContext::new(spec, Utc::now()));
        self.state.lock().current = Some(Arc::clone(&context));

        if let Err(e) = self.runner.launch(&context).await {
            context.close();
            let mut state = self.state.lock();
            state.current = None;
            state.transition(MinePhase::Idle);
            return StartOutcome::Failed(StartMineError::LaunchFailed(detail(&e)));
        }

        context.mark_started(Utc::now());
        {
            let mut state = self.state.lock();
            state.locked = Some(Arc::clone(&context));
            state.transition(MinePhase::Mining);
        }

        tracing::info!(
            context_id = %context.id(),
            coin = %context.spec().main.coin_code,
            kernel = %context.spec().kernel.full_name(),
            dual = context.is_dual(),
            "Mine started"
        );
        if context.spec().gpu_indices.len() < self.gpus.len() {
            tracing::warn!(
                using = context.spec().gpu_indices.len(),
                detected = self.gpus.len(),
                "Not all GPUs are mining"
            );
        }

        self.bus.raise_event(&MineStartedEvent {
            context: Arc::clone(&context),
        });
        StartOutcome::Started(context)
    }

    async fn restart_in_place(&self, context: Arc<MineContext>) -> StartOutcome {
        self.state.lock().transition(MinePhase::Restarting);

        if let Err(e) = self.runner.launch(&context).await {
            tracing::error!(context_id = %context.id(), error = %e, "Kernel relaunch failed");
            self.stop_locked(MineStopReason::InRestartMine).await;
            return StartOutcome::Failed(StartMineError::LaunchFailed(detail(&e)));
        }

        context.mark_restarted(Utc::now());
        self.state.lock().transition(MinePhase::Mining);
        tracing::info!(
            context_id = %context.id(),
            restart_count = context.restart_count(),
            "Kernel restarted"
        );

        self.bus.raise_event(&MineStartedEvent {
            context: Arc::clone(&context),
        });
        StartOutcome::Started(context)
    }

    /// Stop mining.
    ///
    /// Returns false without raising anything when not mining.
    pub async fn stop_mine(&self, reason: MineStopReason) -> bool {
        if !self.is_mining() {
            return false;
        }
        let _op = self.op_lock.lock().await;
        self.stop_locked(reason).await
    }

    async fn stop_locked(&self, reason: MineStopReason) -> bool {
        let context = {
            let mut state = self.state.lock();
            let Some(context) = state.locked.take() else {
                return false;
            };
            state.transition(MinePhase::Stopping);
            context
        };

        if let Err(e) = self.runner.stop(&context).await {
            tracing::warn!(context_id = %context.id(), error = %e, "Kernel stop failed");
        }
        context.close();
        {
            let mut state = self.state.lock();
            if state
                .current
                .as_ref()
                .is_some_and(|c| Arc::ptr_eq(c, &context))
            {
                state.current = None;
            }
            state.transition(MinePhase::Idle);
        }

        tracing::warn!(
            context_id = %context.id(),
            reason = reason.description(),
            "Mine stopped"
        );
        self.bus.raise_event(&MineStoppedEvent { context, reason });
        true
    }

    async fn reset_to_idle(&self) {
        let (locked, current) = {
            let mut state = self.state.lock();
            let taken = (state.locked.take(), state.current.take());
            state.phase = MinePhase::Idle;
            taken
        };
        for context in locked.iter().chain(current.iter()) {
            if let Err(e) = self.runner.stop(context).await {
                tracing::warn!(context_id = %context.id(), error = %e, "Kernel stop failed");
            }
            context.close();
        }
    }

    /// Restart mining under a work mode.
    ///
    /// Fails fast if the mode's work files are absent. Otherwise the mode is
    /// saved, configuration is reloaded when entering or leaving a work mode,
    /// and the kernel is restarted.
    pub async fn restart_mine(&self, work_type: WorkType, worker_name: Option<String>) -> StartOutcome {
        if let Some(missing) = self.work_files.missing(work_type).await {
            let reason = StartMineError::MissingWorkFile(missing);
            tracing::warn!(work_type = ?work_type, reason = %reason, "Restart mine refused");
            self.bus.raise_event(&StartingMineFailedEvent {
                reason: reason.to_string(),
            });
            return StartOutcome::Failed(reason);
        }

        let previous = {
            let mut work = self.work.write();
            let previous = work.work_type;
            work.work_type = work_type;
            work.worker_name.clone_from(&worker_name);
            previous
        };
        if let Err(e) = self
            .settings
            .put_setting(keys::WORK_TYPE, &work_type)
            .and_then(|()| self.settings.put_setting(keys::WORKER_NAME, &worker_name))
        {
            tracing::warn!(error = %e, "Failed to persist work selection");
        }

        if work_type.is_work() || previous.is_work() {
            if let Err(e) = self.reload_config(work_type).await {
                let reason = StartMineError::WorkFileInvalid(e.to_string());
                self.bus.raise_event(&StartingMineFailedEvent {
                    reason: reason.to_string(),
                });
                return StartOutcome::Failed(reason);
            }
        }

        self.start_mine(true).await
    }

    /// Restart the kernel under the current work mode.
    pub async fn restart_kernel(&self) -> StartOutcome {
        let work = self.work.read().clone();
        self.restart_mine(work.work_type, work.worker_name).await
    }

    /// React to a kernel that exited on its own.
    ///
    /// Exits of detached contexts are ignored. A kernel that ran for at
    /// least the exit grace is relaunched; one that died sooner is treated
    /// as broken and mining stops.
    pub async fn handle_kernel_exit(&self, exit: KernelExitedEvent) {
        let Some(context) = self
            .locked_context()
            .filter(|context| context.id() == exit.context_id)
        else {
            tracing::debug!(context_id = %exit.context_id, "Ignoring exit of a detached kernel");
            return;
        };

        let ran = context
            .started_on()
            .map_or_else(chrono::Duration::zero, |started_on| Utc::now() - started_on);
        if ran >= self.exit_grace {
            tracing::warn!(
                context_id = %context.id(),
                code = ?exit.code,
                "Kernel exited, relaunching"
            );
            let _ = self.restart_kernel().await;
        } else {
            tracing::warn!(
                context_id = %context.id(),
                code = ?exit.code,
                ran_seconds = ran.num_seconds(),
                "Kernel exited right after start, stopping"
            );
            self.stop_mine(MineStopReason::KernelExited).await;
        }
    }

    async fn reload_config(&self, work_type: WorkType) -> Result<()> {
        let config = if work_type.is_work() {
            let (profile, catalog) = self.work_files.load(work_type).await?;
            ConfigSet { profile, catalog }
        } else {
            let own = self.own.read().clone();
            own
        };
        *self.active.write() = config;
        tracing::debug!(work_type = ?work_type, "Mining configuration reloaded");
        Ok(())
    }

    // =========================================================================
    // Bus Wiring
    // =========================================================================

    /// Register the controller's command paths and its kernel exit handler
    /// in a new group, and ask the runner to report kernel exits.
    ///
    /// Handlers hold a weak reference, so the controller can still be dropped.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::Internal` outside a tokio runtime or if another
    /// handler already owns one of the commands.
    pub fn attach(self: &Arc<Self>) -> Result<PathGroup> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MinerError::Internal(format!("no tokio runtime: {e}")))?;
        let group = self.bus.new_group();
        let bus_err = |e: hashfleet_bus::BusError| MinerError::Internal(e.to_string());

        let (weak, rt) = (Arc::downgrade(self), runtime.clone());
        self.bus
            .register_command_path::<StartMineCommand, _>(
                PathOptions::new("start mine").log_level(LogLevel::Info).group(group),
                move |cmd| {
                    let is_restart = cmd.is_restart;
                    spawn_op(&weak, &rt, move |c| async move {
                        let _ = c.start_mine(is_restart).await;
                    });
                },
            )
            .map_err(bus_err)?;

        let (weak, rt) = (Arc::downgrade(self), runtime.clone());
        self.bus
            .register_command_path::<StopMineCommand, _>(
                PathOptions::new("stop mine").log_level(LogLevel::Info).group(group),
                move |cmd| {
                    let reason = cmd.reason;
                    spawn_op(&weak, &rt, move |c| async move {
                        c.stop_mine(reason).await;
                    });
                },
            )
            .map_err(bus_err)?;

        let (weak, rt) = (Arc::downgrade(self), runtime.clone());
        self.bus
            .register_event_path::<KernelExitedEvent, _>(
                PathOptions::new("kernel exited").log_level(LogLevel::Info).group(group),
                move |event| {
                    let event = *event;
                    spawn_op(&weak, &rt, move |c| async move {
                        c.handle_kernel_exit(event).await;
                    });
                },
            )
            .map_err(bus_err)?;
        self.runner.report_exits(Arc::clone(&self.bus));

        let (weak, rt) = (Arc::downgrade(self), runtime);
        self.bus
            .register_command_path::<RestartMineCommand, _>(
                PathOptions::new("restart mine").log_level(LogLevel::Info).group(group),
                move |cmd| {
                    let cmd = cmd.clone();
                    spawn_op(&weak, &rt, move |c| async move {
                        let work = c.work.read().clone();
                        let work_type = cmd.work_type.unwrap_or(work.work_type);
                        let worker_name = cmd.worker_name.or(work.worker_name);
                        let _ = c.restart_mine(work_type, worker_name).await;
                    });
                },
            )
            .map_err(bus_err)?;

        Ok(group)
    }
}

impl MiningProbe for MiningController {
    fn locked_context(&self) -> Option<Arc<MineContext>> {
        self.state.lock().locked.clone()
    }

    fn profile(&self) -> MinerProfile {
        self.active.read().profile.clone()
    }

    fn autostart_configured(&self) -> bool {
        self.settings.setting_or(keys::AUTO_BOOT, false)
            && self.settings.setting_or(keys::AUTO_START, false)
    }
}

impl std::fmt::Debug for MiningController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiningController")
            .field("phase", &self.phase())
            .field("work_type", &self.work_type())
            .finish_non_exhaustive()
    }
}

fn spawn_op<F, Fut>(weak: &Weak<MiningController>, runtime: &tokio::runtime::Handle, op: F)
where
    F: FnOnce(Arc<MiningController>) -> Fut,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    match weak.upgrade() {
        Some(controller) => {
            runtime.spawn(op(controller));
        }
        None => tracing::warn!("Mining controller dropped; command ignored"),
    }
}

fn detail(error: &MinerError) -> String {
    match error {
        MinerError::Download(m) | MinerError::Package(m) | MinerError::Kernel(m) => m.clone(),
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
