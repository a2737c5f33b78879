//! In-memory settings store for tests.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use crate::SettingsStore;

/// A `SettingsStore` backed by a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySettingsStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored settings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if no settings are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put_raw(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete_setting(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::SettingNotFound(key.to_string()))
    }

    fn setting_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SettingsExt;

    #[test]
    fn typed_access_through_trait_object() {
        let store: Box<dyn SettingsStore> = Box::new(MemorySettingsStore::new());
        store.put_setting("a", &vec![1u8, 2, 3]).unwrap();
        assert_eq!(store.get_setting::<Vec<u8>>("a").unwrap(), Some(vec![1, 2, 3]));
    }
}
