//! Mock collaborators for testing.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hashfleet_bus::MessageBus;
use hashfleet_core::ContextId;
use parking_lot::{Mutex, RwLock};

use crate::context::MineContext;
use crate::controller::MiningProbe;
use crate::error::{MinerError, Result};
use crate::events::KernelExitedEvent;
use crate::packages::KernelPackages;
use crate::profile::MinerProfile;
use crate::runner::KernelRunner;

/// In-memory package store.
#[derive(Debug, Default)]
pub struct MockKernelPackages {
    present: Mutex<HashSet<String>>,
    download_error: Mutex<Option<String>>,
    prepare_error: Mutex<Option<String>>,
    downloads: AtomicUsize,
}

impl MockKernelPackages {
    /// A store where every package is already present.
    #[must_use]
    pub fn with_present(packages: &[&str]) -> Self {
        let mock = Self::default();
        mock.present
            .lock()
            .extend(packages.iter().map(ToString::to_string));
        mock
    }

    /// Make downloads fail with the given message.
    pub fn fail_downloads(&self, message: &str) {
        *self.download_error.lock() = Some(message.to_string());
    }

    /// Make staging fail with the given message.
    pub fn fail_prepare(&self, message: &str) {
        *self.prepare_error.lock() = Some(message.to_string());
    }

    /// Number of download calls.
    #[must_use]
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KernelPackages for MockKernelPackages {
    async fn is_present(&self, package: &str) -> bool {
        self.present.lock().contains(package)
    }

    async fn download(&self, package: &str) -> Result<()> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.download_error.lock().clone() {
            return Err(MinerError::Download(message));
        }
        self.present.lock().insert(package.to_string());
        Ok(())
    }

    async fn prepare(&self, package: &str) -> Result<PathBuf> {
        if let Some(message) = self.prepare_error.lock().clone() {
            return Err(MinerError::Package(message));
        }
        Ok(PathBuf::from("/kernels").join(package))
    }
}

/// Records launches and stops.
#[derive(Debug, Default)]
pub struct MockKernelRunner {
    launched: Mutex<Vec<ContextId>>,
    stopped: Mutex<Vec<ContextId>>,
    launch_error: Mutex<Option<String>>,
    stop_error: Mutex<Option<String>>,
    panic_on_launch: AtomicBool,
    exits: RwLock<Option<Arc<MessageBus>>>,
}

impl MockKernelRunner {
    /// Create a runner whose launches succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make launches fail with the given message.
    pub fn fail_launches(&self, message: &str) {
        *self.launch_error.lock() = Some(message.to_string());
    }

    /// Make stops fail with the given message after recording them.
    pub fn fail_stops(&self, message: &str) {
        *self.stop_error.lock() = Some(message.to_string());
    }

    /// Make the next launches panic.
    pub fn panic_on_launch(&self) {
        self.panic_on_launch.store(true, Ordering::SeqCst);
    }

    /// Contexts launched, in order.
    #[must_use]
    pub fn launched(&self) -> Vec<ContextId> {
        self.launched.lock().clone()
    }

    /// Contexts stopped, in order.
    #[must_use]
    pub fn stopped(&self) -> Vec<ContextId> {
        self.stopped.lock().clone()
    }

    /// Pretend the kernel of `context_id` exited with `code`.
    ///
    /// Returns false if nothing asked for exit reports.
    pub fn exit(&self, context_id: ContextId, code: Option<i32>) -> bool {
        let Some(bus) = self.exits.read().clone() else {
            return false;
        };
        bus.raise_event(&KernelExitedEvent { context_id, code });
        true
    }
}

#[async_trait]
impl KernelRunner for MockKernelRunner {
    async fn launch(&self, context: &MineContext) -> Result<()> {
        assert!(
            !self.panic_on_launch.load(Ordering::SeqCst),
            "kernel launch exploded"
        );
        if let Some(message) = self.launch_error.lock().clone() {
            return Err(MinerError::Kernel(message));
        }
        self.launched.lock().push(context.id());
        Ok(())
    }

    async fn stop(&self, context: &MineContext) -> Result<()> {
        self.stopped.lock().push(context.id());
        match self.stop_error.lock().clone() {
            Some(message) => Err(MinerError::Kernel(message)),
            None => Ok(()),
        }
    }

    fn report_exits(&self, bus: Arc<MessageBus>) {
        *self.exits.write() = Some(bus);
    }
}

/// A probe whose answers are set directly.
#[derive(Debug, Default)]
pub struct MockMiningProbe {
    context: RwLock<Option<Arc<MineContext>>>,
    profile: RwLock<MinerProfile>,
    autostart: AtomicBool,
}

impl MockMiningProbe {
    /// A probe reporting `profile` and not mining.
    #[must_use]
    pub fn new(profile: MinerProfile) -> Self {
        Self {
            profile: RwLock::new(profile),
            ..Self::default()
        }
    }

    /// Set the locked context.
    pub fn set_context(&self, context: Option<Arc<MineContext>>) {
        *self.context.write() = context;
    }

    /// Set whether autostart is configured.
    pub fn set_autostart(&self, configured: bool) {
        self.autostart.store(configured, Ordering::SeqCst);
    }

    /// Replace the profile.
    pub fn set_profile(&self, profile: MinerProfile) {
        *self.profile.write() = profile;
    }
}

impl MiningProbe for MockMiningProbe {
    fn locked_context(&self) -> Option<Arc<MineContext>> {
        self.context.read().clone()
    }

    fn profile(&self) -> MinerProfile {
        self.profile.read().clone()
    }

    fn autostart_configured(&self) -> bool {
        self.autostart.load(Ordering::SeqCst)
    }
}
