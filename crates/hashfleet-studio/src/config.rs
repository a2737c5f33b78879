//! Studio configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::query::DEFAULT_PAGE_SIZE;

/// Configuration for the fleet studio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Fleet server base URL.
    #[serde(default = "StudioConfig::default_server_url")]
    pub server_url: String,

    /// Directory holding the studio's settings database.
    #[serde(default = "StudioConfig::default_data_dir")]
    pub data_dir: PathBuf,

    /// Rows per page.
    #[serde(default = "StudioConfig::default_page_size")]
    pub page_size: u32,

    /// Request timeout in seconds.
    #[serde(default = "StudioConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Coin codes that get a snapshot row.
    #[serde(default)]
    pub known_coins: Vec<String>,
}

impl StudioConfig {
    fn default_server_url() -> String {
        "http://localhost:3339".to_string()
    }

    fn default_data_dir() -> PathBuf {
        PathBuf::from("./studio-data")
    }

    const fn default_page_size() -> u32 {
        DEFAULT_PAGE_SIZE
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            server_url: Self::default_server_url(),
            data_dir: Self::default_data_dir(),
            page_size: Self::default_page_size(),
            request_timeout_seconds: Self::default_request_timeout(),
            known_coins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: StudioConfig =
            serde_json::from_str(r#"{"server_url":"http://fleet:8080","known_coins":["ETC"]}"#)
                .unwrap();
        assert_eq!(config.server_url, "http://fleet:8080");
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.known_coins, vec!["ETC"]);
    }
}
