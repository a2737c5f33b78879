//! Row highlight thresholds.

use hashfleet_store::{keys, SettingsExt, SettingsStore};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::ClientRecord;

/// How a GPU temperature reads against the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempLevel {
    /// Below `min_temp`.
    Cool,
    /// In range.
    Normal,
    /// At or above `max_temp`.
    Hot,
}

/// Flags computed for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowHighlight {
    /// Main coin reject percent at or above the threshold.
    pub main_reject_high: bool,
    /// Dual coin reject percent at or above the threshold.
    pub dual_reject_high: bool,
    /// Hottest GPU against the temperature thresholds.
    pub temp: TempLevel,
}

/// Highlight thresholds, persisted through settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightThresholds {
    /// Reject percentage that flags a row.
    pub reject_percent: f64,
    /// Temperature below which a GPU is cool.
    pub min_temp: i32,
    /// Temperature at or above which a GPU is hot.
    pub max_temp: i32,
}

impl Default for HighlightThresholds {
    fn default() -> Self {
        Self {
            reject_percent: 10.0,
            min_temp: 40,
            max_temp: 80,
        }
    }
}

impl HighlightThresholds {
    /// Classify a temperature.
    #[must_use]
    pub const fn temp_level(&self, temperature: i32) -> TempLevel {
        if temperature >= self.max_temp {
            TempLevel::Hot
        } else if temperature < self.min_temp {
            TempLevel::Cool
        } else {
            TempLevel::Normal
        }
    }

    /// Compute the flags of one record.
    #[must_use]
    pub fn evaluate(&self, record: &ClientRecord) -> RowHighlight {
        RowHighlight {
            main_reject_high: record.main_coin_reject_percent >= self.reject_percent,
            dual_reject_high: record.is_dual_coin_enabled
                && record.dual_coin_reject_percent >= self.reject_percent,
            temp: self.temp_level(record.max_gpu_temperature),
        }
    }

    /// Load thresholds, keeping the default for any missing key.
    #[must_use]
    pub fn load(settings: &dyn SettingsStore) -> Self {
        let defaults = Self::default();
        Self {
            reject_percent: settings.setting_or(keys::REJECT_PERCENT, defaults.reject_percent),
            min_temp: settings.setting_or(keys::MIN_TEMP, defaults.min_temp),
            max_temp: settings.setting_or(keys::MAX_TEMP, defaults.max_temp),
        }
    }

    /// Persist the thresholds.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::Store` if a write fails.
    pub fn save(&self, settings: &dyn SettingsStore) -> Result<()> {
        settings.put_setting(keys::REJECT_PERCENT, &self.reject_percent)?;
        settings.put_setting(keys::MIN_TEMP, &self.min_temp)?;
        settings.put_setting(keys::MAX_TEMP, &self.max_temp)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashfleet_core::ClientId;
    use hashfleet_store::mock::MemorySettingsStore;

    #[test]
    fn temperature_levels() {
        let t = HighlightThresholds::default();
        assert_eq!(t.temp_level(39), TempLevel::Cool);
        assert_eq!(t.temp_level(40), TempLevel::Normal);
        assert_eq!(t.temp_level(79), TempLevel::Normal);
        assert_eq!(t.temp_level(80), TempLevel::Hot);
    }

    #[test]
    fn reject_threshold_is_inclusive() {
        let t = HighlightThresholds::default();
        let mut record = ClientRecord::new(ClientId::generate(), "rig");
        record.main_coin_reject_percent = 10.0;
        record.dual_coin_reject_percent = 50.0;
        let flags = t.evaluate(&record);
        assert!(flags.main_reject_high);
        assert!(!flags.dual_reject_high);

        record.is_dual_coin_enabled = true;
        assert!(t.evaluate(&record).dual_reject_high);
    }

    #[test]
    fn thresholds_persist() {
        let settings = MemorySettingsStore::new();
        assert_eq!(HighlightThresholds::load(&settings), HighlightThresholds::default());

        let custom = HighlightThresholds {
            reject_percent: 2.5,
            min_temp: 30,
            max_temp: 75,
        };
        custom.save(&settings).unwrap();
        assert_eq!(HighlightThresholds::load(&settings), custom);
    }
}
