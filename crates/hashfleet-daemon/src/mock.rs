//! Mock host for testing.

use async_trait::async_trait;
use hashfleet_core::{LocalIpsRequest, UpgradeRequest, VirtualMemoryRequest};
use parking_lot::Mutex;

use crate::error::{NodeError, Result};
use crate::host::HostOps;

/// A [`HostOps`] that records calls and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingHostOps {
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl RecordingHostOps {
    /// A host whose operations succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    /// Calls received, formatted as `operation:detail`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn call(&self, entry: String) -> Result<()> {
        self.calls.lock().push(entry);
        match self.failure.lock().clone() {
            Some(message) => Err(NodeError::Host(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HostOps for RecordingHostOps {
    async fn restart_computer(&self, reason: &str) -> Result<()> {
        self.call(format!("restart_computer:{reason}"))
    }

    async fn upgrade(&self, request: &UpgradeRequest) -> Result<()> {
        self.call(format!("upgrade:{}", request.file_name))
    }

    async fn set_virtual_memory(&self, request: &VirtualMemoryRequest) -> Result<()> {
        self.call(format!("set_virtual_memory:{}", request.drives.len()))
    }

    async fn set_local_ips(&self, request: &LocalIpsRequest) -> Result<()> {
        self.call(format!("set_local_ips:{}", request.items.len()))
    }

    async fn switch_radeon_gpu(&self, compute_mode: bool) -> Result<()> {
        self.call(format!("switch_radeon_gpu:{compute_mode}"))
    }

    async fn set_auto_boot(&self, auto_boot: bool) -> Result<()> {
        self.call(format!("set_auto_boot:{auto_boot}"))
    }
}
