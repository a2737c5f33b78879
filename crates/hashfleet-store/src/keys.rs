//! Well-known setting keys.
//!
//! Keys are plain UTF-8 names. Per-field keys are built with a `prefix.name`
//! scheme so related settings sort together.

/// Whether the node starts mining when the app starts.
pub const AUTO_START: &str = "node.auto_start";

/// Whether the app is launched at OS boot.
pub const AUTO_BOOT: &str = "node.auto_boot";

/// The node's current work mode.
pub const WORK_TYPE: &str = "node.work_type";

/// The worker name used with the current work mode.
pub const WORKER_NAME: &str = "node.worker_name";

/// The studio's active sort field.
pub const SORT_FIELD: &str = "studio.sort_field";

/// Reject-percent highlight threshold.
pub const REJECT_PERCENT: &str = "studio.reject_percent";

/// Temperature below which a GPU is shown as cool.
pub const MIN_TEMP: &str = "studio.min_temp";

/// Temperature at or above which a GPU is shown as hot.
pub const MAX_TEMP: &str = "studio.max_temp";

/// The studio's page size.
pub const PAGE_SIZE: &str = "studio.page_size";

const SORT_DIRECTION_PREFIX: &str = "studio.sort_direction.";

/// Key of the remembered sort direction for a field.
#[must_use]
pub fn sort_direction_key(field: &str) -> String {
    format!("{SORT_DIRECTION_PREFIX}{field}")
}

/// Extracts the field name from a sort direction key.
#[must_use]
pub fn parse_sort_direction_key(key: &str) -> Option<&str> {
    key.strip_prefix(SORT_DIRECTION_PREFIX)
        .filter(|field| !field.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_direction_key_roundtrip() {
        let key = sort_direction_key("main_coin_speed");
        assert_eq!(key, "studio.sort_direction.main_coin_speed");
        assert_eq!(parse_sort_direction_key(&key), Some("main_coin_speed"));
    }

    #[test]
    fn parse_rejects_foreign_keys() {
        assert_eq!(parse_sort_direction_key(AUTO_START), None);
        assert_eq!(parse_sort_direction_key("studio.sort_direction."), None);
    }
}
