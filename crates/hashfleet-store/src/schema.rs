//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Local application settings, keyed by setting name.
    pub const APP_SETTINGS: &str = "app_settings";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::APP_SETTINGS]
}
