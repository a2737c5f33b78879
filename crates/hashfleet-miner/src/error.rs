//! Error types for the mining node.
//!
//! Two families live here. [`MinerError`] covers infrastructure failures
//! (files, downloads, kernel processes). [`StartMineError`] is the reason a
//! start was refused; its `Display` text is what operators see in the
//! `StartingMineFailedEvent`.

use thiserror::Error;

use crate::lifecycle::MinePhase;

/// A result type using `MinerError`.
pub type Result<T> = std::result::Result<T, MinerError>;

/// Errors from node infrastructure.
#[derive(Debug, Error)]
pub enum MinerError {
    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A work file could not be parsed.
    #[error("invalid json in {file}: {message}")]
    Json {
        /// The offending file.
        file: String,
        /// Parser message.
        message: String,
    },

    /// A kernel package download failed.
    #[error("download failed: {0}")]
    Download(String),

    /// A kernel package could not be staged.
    #[error("package error: {0}")]
    Package(String),

    /// The kernel process could not be launched or stopped.
    #[error("kernel process error: {0}")]
    Kernel(String),

    /// Local settings could not be read or written.
    #[error("storage error: {0}")]
    Store(#[from] hashfleet_store::StoreError),

    /// The requested phase transition is not valid.
    #[error("invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// The current phase.
        from: MinePhase,
        /// The requested phase.
        to: MinePhase,
    },

    /// A kernel stats report does not fit the running context.
    #[error("invalid stats: {0}")]
    InvalidStats(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MinerError {
    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Io(_) | Self::Download(_) => true,
            Self::Store(e) => e.is_retriable(),
            _ => false,
        }
    }
}

/// Why a start request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartMineError {
    /// No main coin is selected.
    #[error("no main coin selected")]
    NoCoinSelected,

    /// The selected main coin is not in the catalog.
    #[error("main coin not found")]
    CoinNotFound,

    /// No pool is selected for the main coin.
    #[error("no main coin pool selected")]
    NoPoolSelected,

    /// No kernel is selected for the main coin.
    #[error("no kernel selected")]
    NoKernelSelected,

    /// The selected kernel is not in the catalog.
    #[error("kernel not found")]
    KernelNotFound,

    /// The kernel has no input definition.
    #[error("kernel input not configured")]
    KernelInputMissing,

    /// The kernel has no output definition.
    #[error("kernel output not configured")]
    KernelOutputMissing,

    /// The kernel cannot drive this node's GPUs.
    #[error("kernel does not support {0} GPUs")]
    GpuNotSupported(hashfleet_core::GpuType),

    /// The pool logs in with an account but no user name is set.
    #[error("pool account user name not set")]
    PoolUserNameMissing,

    /// No wallet is set and the pool is not account-mode.
    #[error("no wallet set")]
    WalletMissing,

    /// Dual mining is on but no dual coin is selected.
    #[error("no dual coin selected")]
    NoDualCoinSelected,

    /// Dual mining is on but no dual pool is selected.
    #[error("no dual coin pool selected")]
    NoDualPoolSelected,

    /// Dual mining is on but no dual wallet is set.
    #[error("no dual coin wallet set")]
    DualWalletMissing,

    /// The kernel has no package name.
    #[error("kernel package not configured")]
    PackageMissing,

    /// The kernel input has no arguments.
    #[error("kernel arguments not configured")]
    ArgsMissing,

    /// A work file required by the requested work mode is absent.
    #[error("missing {0}")]
    MissingWorkFile(String),

    /// A work file exists but cannot be loaded.
    #[error("work files unreadable: {0}")]
    WorkFileInvalid(String),

    /// The kernel package download failed.
    #[error("kernel download failed: {0}")]
    DownloadFailed(String),

    /// The kernel package could not be staged.
    #[error("kernel unpack failed: {0}")]
    UnpackFailed(String),

    /// The kernel process failed to start.
    #[error("kernel launch failed: {0}")]
    LaunchFailed(String),

    /// An unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_texts() {
        assert_eq!(StartMineError::NoCoinSelected.to_string(), "no main coin selected");
        assert_eq!(
            StartMineError::GpuNotSupported(hashfleet_core::GpuType::Amd).to_string(),
            "kernel does not support amd GPUs"
        );
        assert_eq!(
            StartMineError::DownloadFailed("404".into()).to_string(),
            "kernel download failed: 404"
        );
    }

    #[test]
    fn retriable_errors() {
        assert!(MinerError::Download("timeout".into()).is_retriable());
        assert!(!MinerError::Kernel("exit".into()).is_retriable());
    }
}
