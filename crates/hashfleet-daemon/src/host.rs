//! Host side effects.
//!
//! Rebooting, upgrading and reconfiguring the machine are operating-system
//! specific. The daemon reaches them only through [`HostOps`].

use async_trait::async_trait;
use hashfleet_core::{LocalIpsRequest, UpgradeRequest, VirtualMemoryRequest};

use crate::error::Result;

/// Machine-level operations a node can be asked to perform.
#[async_trait]
pub trait HostOps: Send + Sync {
    /// Reboot the machine.
    async fn restart_computer(&self, reason: &str) -> Result<()>;

    /// Replace the node software with the named package.
    async fn upgrade(&self, request: &UpgradeRequest) -> Result<()>;

    /// Resize paging files, in MB per drive.
    async fn set_virtual_memory(&self, request: &VirtualMemoryRequest) -> Result<()>;

    /// Reconfigure network adapters.
    async fn set_local_ips(&self, request: &LocalIpsRequest) -> Result<()>;

    /// Switch Radeon cards between compute and graphics mode.
    async fn switch_radeon_gpu(&self, compute_mode: bool) -> Result<()>;

    /// Register or unregister the node to launch at boot.
    async fn set_auto_boot(&self, auto_boot: bool) -> Result<()>;
}

/// A [`HostOps`] that logs each request and changes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHostOps;

#[async_trait]
impl HostOps for LoggingHostOps {
    async fn restart_computer(&self, reason: &str) -> Result<()> {
        tracing::warn!(reason, "Computer restart requested");
        Ok(())
    }

    async fn upgrade(&self, request: &UpgradeRequest) -> Result<()> {
        tracing::info!(file_name = %request.file_name, "Upgrade requested");
        Ok(())
    }

    async fn set_virtual_memory(&self, request: &VirtualMemoryRequest) -> Result<()> {
        for (drive, mb) in &request.drives {
            tracing::info!(drive = %drive, mb, "Virtual memory change requested");
        }
        Ok(())
    }

    async fn set_local_ips(&self, request: &LocalIpsRequest) -> Result<()> {
        for item in &request.items {
            tracing::info!(
                adapter = %item.adapter_id,
                dhcp = item.is_auto_dhcp,
                ip = %item.ip_address,
                "Network change requested"
            );
        }
        Ok(())
    }

    async fn switch_radeon_gpu(&self, compute_mode: bool) -> Result<()> {
        tracing::info!(compute_mode, "Radeon mode switch requested");
        Ok(())
    }

    async fn set_auto_boot(&self, auto_boot: bool) -> Result<()> {
        tracing::info!(auto_boot, "Boot registration requested");
        Ok(())
    }
}
