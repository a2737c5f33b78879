//! Node mining configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the mining controller and its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Directory holding work files and local state.
    #[serde(default = "MinerConfig::default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding downloaded kernel packages.
    #[serde(default = "MinerConfig::default_packages_dir")]
    pub packages_dir: PathBuf,

    /// Directory kernel packages are staged into.
    #[serde(default = "MinerConfig::default_kernels_dir")]
    pub kernels_dir: PathBuf,

    /// Base URL kernel packages are downloaded from.
    #[serde(default = "MinerConfig::default_package_base_url")]
    pub package_base_url: String,

    /// Package download timeout in seconds.
    #[serde(default = "MinerConfig::default_download_timeout")]
    pub download_timeout_seconds: u64,
}

impl MinerConfig {
    fn default_data_dir() -> PathBuf {
        PathBuf::from("./data")
    }

    fn default_packages_dir() -> PathBuf {
        PathBuf::from("./data/packages")
    }

    fn default_kernels_dir() -> PathBuf {
        PathBuf::from("./data/kernels")
    }

    fn default_package_base_url() -> String {
        "http://localhost:3339/packages".to_string()
    }

    const fn default_download_timeout() -> u64 {
        600
    }

    /// Config rooted at a data directory, with packages and kernels beneath it.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            packages_dir: data_dir.join("packages"),
            kernels_dir: data_dir.join("kernels"),
            data_dir,
            ..Self::default()
        }
    }

    /// Get the download timeout as a `Duration`.
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            packages_dir: Self::default_packages_dir(),
            kernels_dir: Self::default_kernels_dir(),
            package_base_url: Self::default_package_base_url(),
            download_timeout_seconds: Self::default_download_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MinerConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.download_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn with_data_dir_nests_directories() {
        let config = MinerConfig::with_data_dir("/var/lib/hashfleet");
        assert_eq!(config.packages_dir, PathBuf::from("/var/lib/hashfleet/packages"));
        assert_eq!(config.kernels_dir, PathBuf::from("/var/lib/hashfleet/kernels"));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: MinerConfig =
            serde_json::from_str(r#"{"package_base_url":"https://dl.example"}"#).unwrap();
        assert_eq!(config.package_base_url, "https://dl.example");
        assert_eq!(config.download_timeout_seconds, 600);
    }
}
