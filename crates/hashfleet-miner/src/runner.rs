//! Kernel process control.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use hashfleet_bus::MessageBus;
use hashfleet_core::ContextId;
use parking_lot::{Mutex, RwLock};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::context::MineContext;
use crate::error::{MinerError, Result};
use crate::events::KernelExitedEvent;
use crate::packages::kernel_dir;

/// Launches and stops the kernel of a mining context.
#[async_trait]
pub trait KernelRunner: Send + Sync {
    /// Launch the kernel for a context. Any process already running for the
    /// same context is stopped first.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::Kernel` if the process cannot be started.
    async fn launch(&self, context: &MineContext) -> Result<()>;

    /// Stop the kernel of a context. Stopping a context with no process is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::Kernel` if the process cannot be killed.
    async fn stop(&self, context: &MineContext) -> Result<()>;

    /// Raise [`KernelExitedEvent`] on `bus` when a kernel exits without
    /// being stopped. Runners that cannot observe their kernels ignore this.
    fn report_exits(&self, _bus: Arc<MessageBus>) {}
}

/// A runner that only logs.
///
/// Used when the node is driven in dry-run mode.
#[derive(Debug, Default, Clone)]
pub struct NoopKernelRunner;

#[async_trait]
impl KernelRunner for NoopKernelRunner {
    async fn launch(&self, context: &MineContext) -> Result<()> {
        tracing::debug!(
            context_id = %context.id(),
            kernel = %context.spec().kernel.full_name(),
            args = %context.spec().command_line,
            "Kernel launch skipped (no-op runner)"
        );
        Ok(())
    }

    async fn stop(&self, context: &MineContext) -> Result<()> {
        tracing::debug!(context_id = %context.id(), "Kernel stop skipped (no-op runner)");
        Ok(())
    }
}

/// Runs kernels as child processes.
///
/// Each child is owned by a watcher task that either kills it on
/// [`stop`](KernelRunner::stop) or reports its exit.
#[derive(Debug)]
pub struct ProcessKernelRunner {
    kernels_dir: PathBuf,
    running: Arc<Mutex<HashMap<ContextId, RunningKernel>>>,
    exits: RwLock<Option<Arc<MessageBus>>>,
}

#[derive(Debug)]
struct RunningKernel {
    kill: oneshot::Sender<()>,
    watcher: JoinHandle<Result<()>>,
}

impl ProcessKernelRunner {
    /// Create a runner that looks for executables under `kernels_dir`.
    #[must_use]
    pub fn new(kernels_dir: impl Into<PathBuf>) -> Self {
        Self {
            kernels_dir: kernels_dir.into(),
            running: Arc::new(Mutex::new(HashMap::new())),
            exits: RwLock::new(None),
        }
    }

    /// Returns true if a process is running for the context.
    #[must_use]
    pub fn is_running(&self, context_id: &ContextId) -> bool {
        self.running.lock().contains_key(context_id)
    }

    fn executable(&self, context: &MineContext) -> PathBuf {
        let kernel = &context.spec().kernel;
        kernel_dir(&self.kernels_dir, &kernel.package).join(&kernel.command_name)
    }
}

#[async_trait]
impl KernelRunner for ProcessKernelRunner {
    async fn launch(&self, context: &MineContext) -> Result<()> {
        self.stop(context).await?;

        let program = self.executable(context);
        let mut child = Command::new(&program)
            .args(context.spec().command_line.split_whitespace())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MinerError::Kernel(format!("{}: {e}", program.display())))?;

        let context_id = context.id();
        tracing::info!(
            context_id = %context_id,
            program = %program.display(),
            pid = ?child.id(),
            "Kernel process started"
        );

        let (kill, kill_rx) = oneshot::channel();
        let bus = self.exits.read().clone();
        let registry = Arc::clone(&self.running);

        // Held until the entry is in place so a fast exit cannot race it.
        {
            let mut running = self.running.lock();
            let watcher = tokio::spawn(async move {
                let exited = tokio::select! {
                    status = child.wait() => Some(status),
                    _ = kill_rx => None,
                };
                let Some(status) = exited else {
                    if let Err(e) = child.kill().await {
                        return Err(MinerError::Kernel(format!("failed to kill kernel: {e}")));
                    }
                    tracing::info!(context_id = %context_id, "Kernel process stopped");
                    return Ok(());
                };

                registry.lock().remove(&context_id);
                let code = status.as_ref().ok().and_then(ExitStatus::code);
                match &status {
                    Ok(status) => tracing::warn!(
                        context_id = %context_id,
                        status = %status,
                        "Kernel process exited"
                    ),
                    Err(e) => tracing::error!(
                        context_id = %context_id,
                        error = %e,
                        "Lost track of kernel process"
                    ),
                }
                if let Some(bus) = bus {
                    bus.raise_event(&KernelExitedEvent { context_id, code });
                }
                Ok(())
            });
            running.insert(context_id, RunningKernel { kill, watcher });
        }
        Ok(())
    }

    async fn stop(&self, context: &MineContext) -> Result<()> {
        let running = self.running.lock().remove(&context.id());
        let Some(RunningKernel { kill, watcher }) = running else {
            return Ok(());
        };
        // The watcher may already be reporting an exit.
        let _ = kill.send(());
        watcher
            .await
            .map_err(|e| MinerError::Kernel(format!("kernel watcher failed: {e}")))?
    }

    fn report_exits(&self, bus: Arc<MessageBus>) {
        *self.exits.write() = Some(bus);
    }
}
