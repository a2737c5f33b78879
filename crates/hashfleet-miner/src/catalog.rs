//! Server-side catalog of coins, pools and kernels.
//!
//! The catalog is what the fleet server publishes: which coins exist, which
//! pools serve them, which kernels can mine them and with what arguments.
//! A node's [`MinerProfile`](crate::profile::MinerProfile) selects entries
//! from it by ID.

use hashfleet_core::{CoinId, CoinKernelId, GpuType, KernelId, PoolId};
use serde::{Deserialize, Serialize};

/// A mineable coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    /// Coin identifier.
    pub id: CoinId,
    /// Ticker code, e.g. `ETC`.
    pub code: String,
    /// Hash algorithm name.
    #[serde(default)]
    pub algo: String,
    /// Wallet used when the profile leaves the wallet empty.
    #[serde(default)]
    pub test_wallet: Option<String>,
}

/// A mining pool for one coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// Pool identifier.
    pub id: PoolId,
    /// The coin this pool serves.
    pub coin_id: CoinId,
    /// Display name.
    pub name: String,
    /// Stratum endpoint, e.g. `stratum+tcp://pool:4444`.
    pub server: String,
    /// True when the pool logs in with an account instead of a wallet.
    #[serde(default)]
    pub is_user_mode: bool,
}

/// How a kernel is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelInput {
    /// Argument template with `{pool}`, `{wallet}`, `{worker}`, `{user}`,
    /// `{password}` and `{devices}` placeholders.
    pub args: String,
    /// Extra arguments appended when dual mining, with `{dual_pool}` and
    /// `{dual_wallet}` placeholders.
    #[serde(default)]
    pub dual_args: String,
}

/// How a kernel's console output is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelOutput {
    /// Name of the output parser.
    pub parser: String,
}

/// A mining program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    /// Kernel identifier.
    pub id: KernelId,
    /// Kernel code, e.g. `gminer`.
    pub code: String,
    /// Kernel version.
    #[serde(default)]
    pub version: String,
    /// Package file name, e.g. `gminer-2.75.zip`.
    #[serde(default)]
    pub package: String,
    /// Executable name inside the staged package.
    #[serde(default)]
    pub command_name: String,
    /// Invocation definition.
    #[serde(default)]
    pub input: Option<KernelInput>,
    /// Output definition.
    #[serde(default)]
    pub output: Option<KernelOutput>,
}

impl Kernel {
    /// `code` and `version` joined for display.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.version.is_empty() {
            self.code.clone()
        } else {
            format!("{}-{}", self.code, self.version)
        }
    }
}

/// A kernel bound to a coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinKernel {
    /// Binding identifier.
    pub id: CoinKernelId,
    /// The coin.
    pub coin_id: CoinId,
    /// The kernel.
    pub kernel_id: KernelId,
    /// Coin-specific arguments appended to the kernel input.
    #[serde(default)]
    pub args: String,
    /// GPU families this binding runs on.
    #[serde(default)]
    pub supported_gpus: Vec<GpuType>,
}

impl CoinKernel {
    /// Returns true if this binding can run on the given GPU family.
    #[must_use]
    pub fn supports(&self, gpu_type: GpuType) -> bool {
        gpu_type != GpuType::Empty && self.supported_gpus.contains(&gpu_type)
    }
}

/// The full server data set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Known coins.
    #[serde(default)]
    pub coins: Vec<Coin>,
    /// Known pools.
    #[serde(default)]
    pub pools: Vec<Pool>,
    /// Known kernels.
    #[serde(default)]
    pub kernels: Vec<Kernel>,
    /// Known coin/kernel bindings.
    #[serde(default)]
    pub coin_kernels: Vec<CoinKernel>,
}

impl Catalog {
    /// Look up a coin.
    #[must_use]
    pub fn coin(&self, id: &CoinId) -> Option<&Coin> {
        self.coins.iter().find(|c| c.id == *id)
    }

    /// Look up a pool.
    #[must_use]
    pub fn pool(&self, id: &PoolId) -> Option<&Pool> {
        self.pools.iter().find(|p| p.id == *id)
    }

    /// Look up a kernel.
    #[must_use]
    pub fn kernel(&self, id: &KernelId) -> Option<&Kernel> {
        self.kernels.iter().find(|k| k.id == *id)
    }

    /// Look up a coin/kernel binding.
    #[must_use]
    pub fn coin_kernel(&self, id: &CoinKernelId) -> Option<&CoinKernel> {
        self.coin_kernels.iter().find(|ck| ck.id == *id)
    }

    /// Pools serving a coin.
    pub fn pools_for(&self, coin_id: CoinId) -> impl Iterator<Item = &Pool> {
        self.pools.iter().filter(move |p| p.coin_id == coin_id)
    }
}
