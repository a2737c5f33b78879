//! Detected GPU devices.
//!
//! Hardware detection itself is platform specific; the node is handed a
//! [`GpuSet`] built by whatever probe the host provides.

use hashfleet_core::GpuType;
use serde::{Deserialize, Serialize};

/// One GPU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gpu {
    /// Device index as the kernel sees it.
    pub index: u32,
    /// Marketing name.
    pub name: String,
}

/// All GPUs of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuSet {
    /// Vendor family.
    pub gpu_type: GpuType,
    /// Devices, ordered by index.
    pub gpus: Vec<Gpu>,
}

impl GpuSet {
    /// A set of `count` identically named devices.
    #[must_use]
    pub fn uniform(gpu_type: GpuType, name: &str, count: u32) -> Self {
        Self {
            gpu_type,
            gpus: (0..count)
                .map(|index| Gpu {
                    index,
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    /// Number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.gpus.len()
    }

    /// Check if no devices were detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gpus.is_empty()
    }

    /// Resolve a selection to device indices; empty selects all devices.
    /// Indices that don't exist are dropped.
    #[must_use]
    pub fn select(&self, wanted: &[u32]) -> Vec<u32> {
        self.gpus
            .iter()
            .map(|g| g.index)
            .filter(|i| wanted.is_empty() || wanted.contains(i))
            .collect()
    }
}
