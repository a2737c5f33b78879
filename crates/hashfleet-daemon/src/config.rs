//! Node daemon configuration types.

use std::path::PathBuf;
use std::time::Duration;

use hashfleet_core::GpuType;
use hashfleet_miner::{GpuSet, MinerConfig};
use serde::Deserialize;

use crate::operation::DEFAULT_OPERATION_CAPACITY;

/// Configuration for the node daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Listen address (e.g., "0.0.0.0:3337").
    #[serde(default = "NodeConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Directory holding settings, work files and kernel packages.
    #[serde(default = "NodeConfig::default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL kernel packages are downloaded from.
    #[serde(default = "NodeConfig::default_package_base_url")]
    pub package_base_url: String,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "NodeConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "NodeConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Operation results kept for inspection.
    #[serde(default = "NodeConfig::default_operation_capacity")]
    pub operation_result_capacity: usize,

    /// Seconds to wait after boot before an automatic start.
    #[serde(default = "NodeConfig::default_autostart_delay")]
    pub autostart_delay_seconds: u32,

    /// GPU vendor of this machine.
    #[serde(default)]
    pub gpu_type: GpuType,

    /// Number of GPUs.
    #[serde(default)]
    pub gpu_count: u32,

    /// GPU model name.
    #[serde(default)]
    pub gpu_name: String,
}

impl NodeConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:3337".to_string()
    }

    fn default_data_dir() -> PathBuf {
        PathBuf::from("./data")
    }

    fn default_package_base_url() -> String {
        "http://localhost:3339/packages".to_string()
    }

    const fn default_max_body() -> usize {
        4 * 1024 * 1024 // work files can be large
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_operation_capacity() -> usize {
        DEFAULT_OPERATION_CAPACITY
    }

    const fn default_autostart_delay() -> u32 {
        10
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// The GPUs this node mines on.
    #[must_use]
    pub fn gpus(&self) -> GpuSet {
        GpuSet::uniform(self.gpu_type, &self.gpu_name, self.gpu_count)
    }

    /// Mining configuration rooted at this node's data directory.
    #[must_use]
    pub fn miner_config(&self) -> MinerConfig {
        MinerConfig {
            package_base_url: self.package_base_url.clone(),
            ..MinerConfig::with_data_dir(&self.data_dir)
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            data_dir: Self::default_data_dir(),
            package_base_url: Self::default_package_base_url(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
            operation_result_capacity: Self::default_operation_capacity(),
            autostart_delay_seconds: Self::default_autostart_delay(),
            gpu_type: GpuType::Empty,
            gpu_count: 0,
            gpu_name: String::new(),
        }
    }
}
