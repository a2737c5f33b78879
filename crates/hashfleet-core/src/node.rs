//! Wire types of the node control surface.
//!
//! The node daemon serves these over HTTP and the studio sends them through
//! the fleet server, so both sides share one definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::WorkType;

/// Start or restart mining, optionally with new work files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequest {
    /// Work mode to mine under.
    #[serde(default)]
    pub work_type: WorkType,
    /// Worker name override.
    #[serde(default)]
    pub worker_name: Option<String>,
    /// Local profile JSON; required when `work_type` is a work mode.
    #[serde(default)]
    pub local_json: Option<String>,
    /// Server catalog JSON; required when `work_type` is a work mode.
    #[serde(default)]
    pub server_json: Option<String>,
}

/// Replace the node software with a released package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRequest {
    /// Package file name on the release server.
    pub file_name: String,
}

/// Set the page file size per drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMemoryRequest {
    /// Size in megabytes, keyed by drive name.
    #[serde(default)]
    pub drives: BTreeMap<String, u32>,
}

/// Network settings of one adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIpInput {
    /// Adapter identifier.
    pub adapter_id: String,
    /// Use DHCP; the static fields are ignored when set.
    #[serde(default)]
    pub is_auto_dhcp: bool,
    /// Static address.
    #[serde(default)]
    pub ip_address: String,
    /// Static subnet mask.
    #[serde(default)]
    pub subnet_mask: String,
    /// Static gateway.
    #[serde(default)]
    pub default_gateway: String,
    /// DNS servers; empty means automatic.
    #[serde(default)]
    pub dns_servers: Vec<String>,
}

/// Set the network settings of one or more adapters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIpsRequest {
    /// One entry per adapter.
    #[serde(default)]
    pub items: Vec<LocalIpInput>,
}

/// Switch AMD GPUs between graphics and compute mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadeonSwitchRequest {
    /// True for compute mode.
    pub compute_mode: bool,
}

/// Configure launch-at-boot and mine-on-launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoBootRequest {
    /// Launch the node at OS boot.
    pub auto_boot: bool,
    /// Start mining when the node launches.
    pub auto_start: bool,
}

/// Cumulative counters of one coin since the kernel started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoinStatsReport {
    /// Total hash rate in hashes per second.
    pub speed: f64,
    /// Accepted shares.
    #[serde(default)]
    pub accepted_shares: u64,
    /// Rejected shares.
    #[serde(default)]
    pub rejected_shares: u64,
}

/// Hash rate and share totals of the running kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelStatsReport {
    /// The main coin.
    pub main: CoinStatsReport,
    /// The dual coin, when dual mining.
    #[serde(default)]
    pub dual: Option<CoinStatsReport>,
}

/// Outcome of one remote operation, kept by the node for later inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Unix time in milliseconds.
    pub timestamp: i64,
    /// Operation name.
    pub operation: String,
    /// HTTP-style status: 200 on success.
    pub state_code: u16,
    /// Human-readable detail.
    pub description: String,
}

impl OperationResult {
    /// Returns true for a 2xx state code.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.state_code >= 200 && self.state_code < 300
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_request_fields_default() {
        let req: WorkRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, WorkRequest::default());

        let req: WorkRequest =
            serde_json::from_str(r#"{"work_type":"self_work","local_json":"{}"}"#).unwrap();
        assert_eq!(req.work_type, WorkType::SelfWork);
        assert_eq!(req.local_json.as_deref(), Some("{}"));
        assert!(req.server_json.is_none());
    }

    #[test]
    fn stats_report_share_counts_default_to_zero() {
        let report: KernelStatsReport =
            serde_json::from_str(r#"{"main":{"speed":31.5e6}}"#).unwrap();
        assert_eq!(report.main.accepted_shares, 0);
        assert!(report.dual.is_none());
    }

    #[test]
    fn operation_result_success() {
        let mut result = OperationResult {
            timestamp: 1,
            operation: "upgrade".into(),
            state_code: 200,
            description: "ok".into(),
        };
        assert!(result.is_success());
        result.state_code = 500;
        assert!(!result.is_success());
    }
}
