//! Small domain enums shared between the node and the studio.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// GPU vendor family of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuType {
    /// No GPU detected.
    #[default]
    Empty,
    /// NVIDIA cards.
    Nvidia,
    /// AMD cards.
    Amd,
}

impl GpuType {
    /// Returns the lowercase name used in query filters and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Nvidia => "nvidia",
            Self::Amd => "amd",
        }
    }
}

impl fmt::Display for GpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GpuType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "empty" | "" => Ok(Self::Empty),
            "nvidia" => Ok(Self::Nvidia),
            "amd" => Ok(Self::Amd),
            _ => Err(CoreError::UnknownVariant {
                kind: "gpu type",
                value: s.to_string(),
            }),
        }
    }
}

/// Where a node's mining configuration comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    /// The node's own profile, edited locally.
    #[default]
    None,
    /// A self-directed work file pushed by the operator.
    SelfWork,
    /// A fleet-assigned work file.
    MineWork,
}

impl WorkType {
    /// Returns true for the file-backed work modes.
    #[must_use]
    pub const fn is_work(&self) -> bool {
        matches!(self, Self::SelfWork | Self::MineWork)
    }

    /// File names of the local profile and server catalog for this mode.
    #[must_use]
    pub const fn file_names(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::None => None,
            Self::SelfWork => Some(("self-work-local.json", "self-work-server.json")),
            Self::MineWork => Some(("mine-work-local.json", "mine-work-server.json")),
        }
    }
}
