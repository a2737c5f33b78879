//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `SettingsStore` trait.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded, Options};

use crate::error::{Result, StoreError};
use crate::schema::{all_column_families, cf};
use crate::SettingsStore;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)?;

        tracing::debug!(path = %path.as_ref().display(), "Opened settings store");
        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::MissingColumnFamily(name.to_string()))
    }
}

impl SettingsStore for RocksStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf::APP_SETTINGS)?;
        self.db
            .get_cf(&cf, key.as_bytes())
            .map_err(StoreError::from)
    }

    fn put_raw(&self, key: &str, value: &[u8]) -> Result<()> {
        let cf = self.cf(cf::APP_SETTINGS)?;
        self.db
            .put_cf(&cf, key.as_bytes(), value)
            .map_err(StoreError::from)
    }

    fn delete_setting(&self, key: &str) -> Result<()> {
        if self.get_raw(key)?.is_none() {
            return Err(StoreError::SettingNotFound(key.to_string()));
        }
        let cf = self.cf(cf::APP_SETTINGS)?;
        self.db
            .delete_cf(&cf, key.as_bytes())
            .map_err(StoreError::from)
    }

    fn setting_keys(&self) -> Result<Vec<String>> {
        let cf = self.cf(cf::APP_SETTINGS)?;
        let mut keys = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = item?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::Codec(e.to_string()))?;
            keys.push(key);
        }
        Ok(keys)
    }
}
