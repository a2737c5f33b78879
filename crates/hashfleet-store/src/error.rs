//! Error types for the settings store.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while reading or writing settings.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No setting is stored under this key.
    #[error("setting not found: {0}")]
    SettingNotFound(String),

    /// The database was opened without a required column family.
    #[error("column family missing: {0}")]
    MissingColumnFamily(String),

    /// `RocksDB` rejected the operation.
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// A key or value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
