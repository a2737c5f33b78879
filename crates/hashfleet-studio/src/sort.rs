//! Sort fields and the remembered sort specification.
//!
//! Every field remembers its own direction. Switching to another field keeps
//! the old field's direction for when the operator comes back to it.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use hashfleet_store::{keys, SettingsExt, SettingsStore};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::record::ClientRecord;

/// A sortable column of the fleet view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Node name.
    MinerName,
    /// Main coin hash rate.
    MainCoinSpeed,
    /// Dual coin hash rate.
    DualCoinSpeed,
    /// Main coin reject percentage.
    MainCoinRejectPercent,
    /// Dual coin reject percentage.
    DualCoinRejectPercent,
    /// Main coin pool latency.
    MainCoinPoolDelay,
    /// Dual coin pool latency.
    DualCoinPoolDelay,
    /// CPU temperature.
    CpuTemperature,
    /// Hottest GPU temperature.
    GpuTemperature,
    /// Kernel restarts in the current run.
    KernelSelfRestartCount,
    /// Free disk space.
    DiskSpace,
    /// Last report time.
    LastActiveOn,
}

impl SortField {
    /// Every field, in display order.
    pub const ALL: [Self; 12] = [
        Self::MinerName,
        Self::MainCoinSpeed,
        Self::DualCoinSpeed,
        Self::MainCoinRejectPercent,
        Self::DualCoinRejectPercent,
        Self::MainCoinPoolDelay,
        Self::DualCoinPoolDelay,
        Self::CpuTemperature,
        Self::GpuTemperature,
        Self::KernelSelfRestartCount,
        Self::DiskSpace,
        Self::LastActiveOn,
    ];

    /// Settings-friendly name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MinerName => "miner_name",
            Self::MainCoinSpeed => "main_coin_speed",
            Self::DualCoinSpeed => "dual_coin_speed",
            Self::MainCoinRejectPercent => "main_coin_reject_percent",
            Self::DualCoinRejectPercent => "dual_coin_reject_percent",
            Self::MainCoinPoolDelay => "main_coin_pool_delay",
            Self::DualCoinPoolDelay => "dual_coin_pool_delay",
            Self::CpuTemperature => "cpu_temperature",
            Self::GpuTemperature => "gpu_temperature",
            Self::KernelSelfRestartCount => "kernel_self_restart_count",
            Self::DiskSpace => "disk_space",
            Self::LastActiveOn => "last_active_on",
        }
    }

    /// Direction used until the operator picks one.
    #[must_use]
    pub const fn default_direction(&self) -> SortDirection {
        match self {
            Self::CpuTemperature
            | Self::DualCoinPoolDelay
            | Self::DualCoinRejectPercent
            | Self::KernelSelfRestartCount
            | Self::MainCoinPoolDelay
            | Self::MainCoinRejectPercent => SortDirection::Descending,
            _ => SortDirection::Ascending,
        }
    }

    /// Compare two records by this field, ascending.
    #[must_use]
    pub fn compare(&self, a: &ClientRecord, b: &ClientRecord) -> Ordering {
        match self {
            Self::MinerName => a
                .miner_name
                .to_lowercase()
                .cmp(&b.miner_name.to_lowercase()),
            Self::MainCoinSpeed => a.main_coin_speed.total_cmp(&b.main_coin_speed),
            Self::DualCoinSpeed => a.dual_coin_speed.total_cmp(&b.dual_coin_speed),
            Self::MainCoinRejectPercent => a
                .main_coin_reject_percent
                .total_cmp(&b.main_coin_reject_percent),
            Self::DualCoinRejectPercent => a
                .dual_coin_reject_percent
                .total_cmp(&b.dual_coin_reject_percent),
            Self::MainCoinPoolDelay => a.main_coin_pool_delay.cmp(&b.main_coin_pool_delay),
            Self::DualCoinPoolDelay => a.dual_coin_pool_delay.cmp(&b.dual_coin_pool_delay),
            Self::CpuTemperature => a.cpu_temperature.cmp(&b.cpu_temperature),
            Self::GpuTemperature => a.max_gpu_temperature.cmp(&b.max_gpu_temperature),
            Self::KernelSelfRestartCount => a
                .kernel_self_restart_count
                .cmp(&b.kernel_self_restart_count),
            Self::DiskSpace => a.disk_space_mb.cmp(&b.disk_space_mb),
            Self::LastActiveOn => a.last_active_on.cmp(&b.last_active_on),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StudioError::InvalidInput(format!("unknown sort field: {s}")))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// The other direction.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    /// Apply this direction to an ascending ordering.
    #[must_use]
    pub const fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// A field together with the direction it is sorted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveSort {
    /// The field.
    pub field: SortField,
    /// Its direction.
    pub direction: SortDirection,
}

impl ActiveSort {
    /// Compare two records under this sort.
    #[must_use]
    pub fn compare(&self, a: &ClientRecord, b: &ClientRecord) -> Ordering {
        self.direction.apply(self.field.compare(a, b))
    }
}

/// The active field plus every field's remembered direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    active: SortField,
    directions: HashMap<SortField, SortDirection>,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            active: SortField::MinerName,
            directions: SortField::ALL
                .into_iter()
                .map(|f| (f, f.default_direction()))
                .collect(),
        }
    }
}

impl SortSpec {
    /// The active field.
    #[must_use]
    pub const fn field(&self) -> SortField {
        self.active
    }

    /// The remembered direction of a field.
    #[must_use]
    pub fn direction(&self, field: SortField) -> SortDirection {
        self.directions
            .get(&field)
            .copied()
            .unwrap_or_else(|| field.default_direction())
    }

    /// The active field with its direction.
    #[must_use]
    pub fn active(&self) -> ActiveSort {
        ActiveSort {
            field: self.active,
            direction: self.direction(self.active),
        }
    }

    /// Select a column: the active field toggles its direction, any other
    /// field becomes active with its remembered direction.
    pub fn select(&mut self, field: SortField) -> ActiveSort {
        if field == self.active {
            let toggled = self.direction(field).toggled();
            self.directions.insert(field, toggled);
        } else {
            self.active = field;
        }
        self.active()
    }

    /// Set a field's direction without changing the active field.
    pub fn set_direction(&mut self, field: SortField, direction: SortDirection) {
        self.directions.insert(field, direction);
    }

    /// Load the spec from settings, falling back to defaults per key.
    #[must_use]
    pub fn load(settings: &dyn SettingsStore) -> Self {
        let mut spec = Self::default();
        if let Some(field) = settings.setting_or::<Option<SortField>>(keys::SORT_FIELD, None) {
            spec.active = field;
        }
        for field in SortField::ALL {
            let key = keys::sort_direction_key(field.as_str());
            if let Some(direction) = settings.setting_or::<Option<SortDirection>>(&key, None) {
                spec.directions.insert(field, direction);
            }
        }
        spec
    }

    /// Persist the active field and every remembered direction.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::Store` if a write fails.
    pub fn save(&self, settings: &dyn SettingsStore) -> Result<()> {
        settings.put_setting(keys::SORT_FIELD, &self.active)?;
        for field in SortField::ALL {
            let key = keys::sort_direction_key(field.as_str());
            settings.put_setting(&key, &self.direction(field))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashfleet_core::ClientId;
    use hashfleet_store::mock::MemorySettingsStore;

    #[test]
    fn default_directions() {
        let spec = SortSpec::default();
        assert_eq!(spec.field(), SortField::MinerName);
        assert_eq!(spec.direction(SortField::MinerName), SortDirection::Ascending);
        assert_eq!(spec.direction(SortField::CpuTemperature), SortDirection::Descending);
        assert_eq!(spec.direction(SortField::MainCoinRejectPercent), SortDirection::Descending);
        assert_eq!(spec.direction(SortField::DiskSpace), SortDirection::Ascending);
        assert_eq!(spec.direction(SortField::LastActiveOn), SortDirection::Ascending);
    }

    #[test]
    fn toggling_twice_restores_direction() {
        let mut spec = SortSpec::default();
        spec.select(SortField::MainCoinSpeed);
        let before = spec.active();
        spec.select(SortField::MainCoinSpeed);
        assert_eq!(spec.active().direction, before.direction.toggled());
        spec.select(SortField::MainCoinSpeed);
        assert_eq!(spec.active(), before);
    }

    #[test]
    fn switching_fields_keeps_remembered_directions() {
        let mut spec = SortSpec::default();
        spec.select(SortField::MainCoinSpeed);
        spec.select(SortField::MainCoinSpeed);
        assert_eq!(spec.active().direction, SortDirection::Descending);

        let other = spec.select(SortField::CpuTemperature);
        assert_eq!(other.direction, SortDirection::Descending);

        let back = spec.select(SortField::MainCoinSpeed);
        assert_eq!(back.direction, SortDirection::Descending);
    }

    #[test]
    fn names_compare_case_insensitively() {
        let a = ClientRecord::new(ClientId::generate(), "alpha");
        let b = ClientRecord::new(ClientId::generate(), "Beta");
        assert_eq!(SortField::MinerName.compare(&a, &b), Ordering::Less);

        let desc = ActiveSort {
            field: SortField::MinerName,
            direction: SortDirection::Descending,
        };
        assert_eq!(desc.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn field_parses_from_name() {
        assert_eq!("main_coin_speed".parse::<SortField>().unwrap(), SortField::MainCoinSpeed);
        assert_eq!("DISK_SPACE".parse::<SortField>().unwrap(), SortField::DiskSpace);
        assert!("speed".parse::<SortField>().is_err());
    }

    #[test]
    fn spec_persists_through_settings() {
        let settings = MemorySettingsStore::new();
        let mut spec = SortSpec::default();
        spec.select(SortField::DiskSpace);
        spec.select(SortField::DiskSpace);
        spec.save(&settings).unwrap();

        let loaded = SortSpec::load(&settings);
        assert_eq!(loaded, spec);
        assert_eq!(loaded.active().direction, SortDirection::Descending);
    }

    #[test]
    fn missing_settings_load_defaults() {
        let settings = MemorySettingsStore::new();
        assert_eq!(SortSpec::load(&settings), SortSpec::default());
    }
}
