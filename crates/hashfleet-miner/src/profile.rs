//! The node's local mining profile.
//!
//! The profile selects catalog entries by ID and carries the user's wallets,
//! pool accounts and restart policy. Missing per-coin or per-pool entries
//! read as defaults, so a fresh profile is always usable.

use std::collections::HashMap;

use hashfleet_core::{CoinId, CoinKernelId, PoolId};
use serde::{Deserialize, Serialize};

/// Low-hash-rate machine restart settings for one coin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LowSpeedSettings {
    /// Whether the trigger is active.
    #[serde(default)]
    pub enabled: bool,
    /// Hash-rate floor; zero disables the trigger.
    #[serde(default)]
    pub low_speed: f64,
    /// Minutes the rate must stay below the floor.
    #[serde(default)]
    pub minutes: u32,
}

/// Per-coin selections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoinProfile {
    /// Pool used when this coin is mined as the main coin.
    #[serde(default)]
    pub pool_id: PoolId,
    /// Wallet used when this coin is mined as the main coin.
    #[serde(default)]
    pub wallet: String,
    /// Kernel binding used for this coin.
    #[serde(default)]
    pub coin_kernel_id: CoinKernelId,
    /// Pool used when this coin is mined as the dual coin.
    #[serde(default)]
    pub dual_coin_pool_id: PoolId,
    /// Wallet used when this coin is mined as the dual coin.
    #[serde(default)]
    pub dual_coin_wallet: String,
    /// Low-speed restart policy.
    #[serde(default)]
    pub low_speed: LowSpeedSettings,
}

/// Per-pool account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolProfile {
    /// Account name for account-mode pools.
    #[serde(default)]
    pub user_name: String,
    /// Account password.
    #[serde(default)]
    pub password: String,
}

/// Per-binding options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinKernelProfile {
    /// Whether a second coin is mined alongside the main coin.
    #[serde(default)]
    pub is_dual_coin_enabled: bool,
    /// The second coin.
    #[serde(default)]
    pub dual_coin_id: CoinId,
}

/// Restart policy evaluated by the watchdog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct WatchdogSettings {
    /// Restart the machine after a fixed uptime.
    #[serde(default)]
    pub periodic_restart_computer: bool,
    /// Hours part of the machine uptime limit.
    #[serde(default)]
    pub periodic_restart_computer_hours: u32,
    /// Minutes part of the machine uptime limit.
    #[serde(default)]
    pub periodic_restart_computer_minutes: u32,
    /// Restart the kernel after a fixed session length.
    #[serde(default)]
    pub periodic_restart_kernel: bool,
    /// Hours part of the session length limit.
    #[serde(default)]
    pub periodic_restart_kernel_hours: u32,
    /// Minutes part of the session length limit.
    #[serde(default)]
    pub periodic_restart_kernel_minutes: u32,
    /// Restart the kernel when no share is accepted for a while.
    #[serde(default)]
    pub no_share_restart_kernel: bool,
    /// No-share window for kernel restarts, in minutes.
    #[serde(default)]
    pub no_share_restart_kernel_minutes: u32,
    /// Restart the machine when no share is accepted for a while.
    #[serde(default)]
    pub no_share_restart_computer: bool,
    /// No-share window for machine restarts, in minutes.
    #[serde(default)]
    pub no_share_restart_computer_minutes: u32,
}

impl WatchdogSettings {
    /// Machine uptime limit in minutes.
    #[must_use]
    pub const fn periodic_computer_minutes(&self) -> i64 {
        60 * self.periodic_restart_computer_hours as i64
            + self.periodic_restart_computer_minutes as i64
    }

    /// Session length limit in minutes.
    #[must_use]
    pub const fn periodic_kernel_minutes(&self) -> i64 {
        60 * self.periodic_restart_kernel_hours as i64 + self.periodic_restart_kernel_minutes as i64
    }
}

/// The node's local mining profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinerProfile {
    /// Main coin.
    #[serde(default)]
    pub coin_id: CoinId,
    /// Worker name reported to pools.
    #[serde(default)]
    pub worker_name: String,
    /// GPU indices to mine on; empty means all.
    #[serde(default)]
    pub gpu_indices: Vec<u32>,
    /// Per-coin selections.
    #[serde(default)]
    pub coins: HashMap<CoinId, CoinProfile>,
    /// Per-pool accounts.
    #[serde(default)]
    pub pools: HashMap<PoolId, PoolProfile>,
    /// Per-binding options.
    #[serde(default)]
    pub coin_kernels: HashMap<CoinKernelId, CoinKernelProfile>,
    /// Restart policy.
    #[serde(default)]
    pub watchdog: WatchdogSettings,
}

impl MinerProfile {
    /// Selections for a coin, or defaults.
    #[must_use]
    pub fn coin_profile(&self, coin_id: &CoinId) -> CoinProfile {
        self.coins.get(coin_id).cloned().unwrap_or_default()
    }

    /// Account for a pool, or defaults.
    #[must_use]
    pub fn pool_profile(&self, pool_id: &PoolId) -> PoolProfile {
        self.pools.get(pool_id).cloned().unwrap_or_default()
    }

    /// Options for a binding, or defaults.
    #[must_use]
    pub fn coin_kernel_profile(&self, id: &CoinKernelId) -> CoinKernelProfile {
        self.coin_kernels.get(id).cloned().unwrap_or_default()
    }

    /// Mutable selections for a coin, created on first use.
    pub fn coin_profile_mut(&mut self, coin_id: CoinId) -> &mut CoinProfile {
        self.coins.entry(coin_id).or_default()
    }
}
