//! `RocksDB` settings storage for hashfleet.
//!
//! Nodes and the studio keep a handful of local settings (autostart flags,
//! remembered sort directions, highlight thresholds, current work mode).
//! This crate stores them as CBOR values in a single column family.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `app_settings`: Local application settings, keyed by setting name
//!
//! # Example
//!
//! ```no_run
//! use hashfleet_store::{keys, RocksStore, SettingsExt};
//!
//! let store = RocksStore::open("/tmp/hashfleet-db").unwrap();
//! store.put_setting(keys::AUTO_START, &true).unwrap();
//! let auto_start: Option<bool> = store.get_setting(keys::AUTO_START).unwrap();
//! assert_eq!(auto_start, Some(true));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

/// Raw key/value access to local settings.
///
/// Implementations must be safe to share across threads. Use the
/// [`SettingsExt`] helpers for typed access.
pub trait SettingsStore: Send + Sync {
    /// Get the raw value of a setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or replace the raw value of a setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_raw(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a setting.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SettingNotFound` if the setting doesn't exist.
    fn delete_setting(&self, key: &str) -> Result<()>;

    /// List all setting keys in lexical order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn setting_keys(&self) -> Result<Vec<String>>;
}

/// Typed CBOR helpers over any [`SettingsStore`].
pub trait SettingsExt: SettingsStore {
    /// Get and decode a setting.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Codec` if the stored value has another shape.
    fn get_setting<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_raw(key)?
            .map(|data| decode(&data))
            .transpose()
    }

    /// Encode and store a setting.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    fn put_setting<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.put_raw(key, &encode(value)?)
    }

    /// Get a setting, falling back to `default` when it is missing or unreadable.
    fn setting_or<T: serde::de::DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get_setting(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring unreadable setting");
                default
            }
        }
    }
}

impl<S: SettingsStore + ?Sized> SettingsExt for S {}

/// Serialize a value using CBOR.
pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Codec(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a value from CBOR.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| StoreError::Codec(e.to_string()))
}
