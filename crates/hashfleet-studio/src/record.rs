//! Fleet node records.
//!
//! A [`ClientRecord`] is the snapshot of one node as the fleet server last
//! reported it. A [`ClientView`] wraps a record with a stable identity:
//! reconciliation updates the record inside the same `Arc<ClientView>` for as
//! long as the node keeps appearing in query results, so anything holding the
//! view (selection, an open edit) stays attached to the same node.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use hashfleet_core::{ClientId, GpuType, GroupId, WorkId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Snapshot of one fleet node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Identity key; never changes for a node.
    pub id: ClientId,
    /// Name shown in the studio.
    #[serde(default)]
    pub miner_name: String,
    /// Worker name reported to pools.
    #[serde(default)]
    pub worker_name: String,
    /// Node address.
    #[serde(default)]
    pub miner_ip: String,
    /// Group the node belongs to.
    #[serde(default)]
    pub group_id: Option<GroupId>,
    /// Work assigned to the node.
    #[serde(default)]
    pub work_id: Option<WorkId>,
    /// Node software version.
    #[serde(default)]
    pub version: String,
    /// Whether the node reported recently.
    #[serde(default)]
    pub is_online: bool,
    /// Whether the node is mining.
    #[serde(default)]
    pub is_mining: bool,
    /// Kernel in use.
    #[serde(default)]
    pub kernel: String,
    /// In-place kernel restarts in the current run.
    #[serde(default)]
    pub kernel_self_restart_count: u32,
    /// Main coin code.
    #[serde(default)]
    pub main_coin_code: String,
    /// Main coin pool.
    #[serde(default)]
    pub main_coin_pool: String,
    /// Main coin wallet.
    #[serde(default)]
    pub main_coin_wallet: String,
    /// Main coin hash rate.
    #[serde(default)]
    pub main_coin_speed: f64,
    /// Main coin rejected share percentage.
    #[serde(default)]
    pub main_coin_reject_percent: f64,
    /// Main coin pool latency in milliseconds.
    #[serde(default)]
    pub main_coin_pool_delay: u32,
    /// Whether dual mining is on.
    #[serde(default)]
    pub is_dual_coin_enabled: bool,
    /// Dual coin code.
    #[serde(default)]
    pub dual_coin_code: String,
    /// Dual coin pool.
    #[serde(default)]
    pub dual_coin_pool: String,
    /// Dual coin hash rate.
    #[serde(default)]
    pub dual_coin_speed: f64,
    /// Dual coin rejected share percentage.
    #[serde(default)]
    pub dual_coin_reject_percent: f64,
    /// Dual coin pool latency in milliseconds.
    #[serde(default)]
    pub dual_coin_pool_delay: u32,
    /// GPU vendor.
    #[serde(default)]
    pub gpu_type: GpuType,
    /// GPU model.
    #[serde(default)]
    pub gpu_name: String,
    /// GPU driver version.
    #[serde(default)]
    pub gpu_driver: String,
    /// Hottest GPU in degrees Celsius.
    #[serde(default)]
    pub max_gpu_temperature: i32,
    /// CPU temperature in degrees Celsius.
    #[serde(default)]
    pub cpu_temperature: i32,
    /// Free disk space in megabytes.
    #[serde(default)]
    pub disk_space_mb: u64,
    /// Last report time.
    #[serde(default = "ClientRecord::default_last_active_on")]
    pub last_active_on: DateTime<Utc>,
}

impl ClientRecord {
    fn default_last_active_on() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    /// A record with only the identity and name set.
    #[must_use]
    pub fn new(id: ClientId, miner_name: impl Into<String>) -> Self {
        Self {
            id,
            miner_name: miner_name.into(),
            worker_name: String::new(),
            miner_ip: String::new(),
            group_id: None,
            work_id: None,
            version: String::new(),
            is_online: false,
            is_mining: false,
            kernel: String::new(),
            kernel_self_restart_count: 0,
            main_coin_code: String::new(),
            main_coin_pool: String::new(),
            main_coin_wallet: String::new(),
            main_coin_speed: 0.0,
            main_coin_reject_percent: 0.0,
            main_coin_pool_delay: 0,
            is_dual_coin_enabled: false,
            dual_coin_code: String::new(),
            dual_coin_pool: String::new(),
            dual_coin_speed: 0.0,
            dual_coin_reject_percent: 0.0,
            dual_coin_pool_delay: 0,
            gpu_type: GpuType::Empty,
            gpu_name: String::new(),
            gpu_driver: String::new(),
            max_gpu_temperature: 0,
            cpu_temperature: 0,
            disk_space_mb: 0,
            last_active_on: Self::default_last_active_on(),
        }
    }
}

/// Identity-stable wrapper around a [`ClientRecord`].
#[derive(Debug)]
pub struct ClientView {
    id: ClientId,
    record: RwLock<ClientRecord>,
    selected: AtomicBool,
}

impl ClientView {
    /// Wrap a record.
    #[must_use]
    pub fn new(record: ClientRecord) -> Self {
        Self {
            id: record.id,
            record: RwLock::new(record),
            selected: AtomicBool::new(false),
        }
    }

    /// The node's identity key.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// A copy of the current record.
    #[must_use]
    pub fn record(&self) -> ClientRecord {
        self.record.read().clone()
    }

    /// Run `f` against the current record without copying it.
    pub fn with_record<R>(&self, f: impl FnOnce(&ClientRecord) -> R) -> R {
        f(&self.record.read())
    }

    /// Replace the record. Records for another node are ignored.
    pub fn update(&self, record: ClientRecord) {
        if record.id != self.id {
            tracing::warn!(view = %self.id, record = %record.id, "Ignoring record for another client");
            return;
        }
        *self.record.write() = record;
    }

    /// Whether the operator selected this node.
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected.load(Ordering::Relaxed)
    }

    /// Select or deselect this node.
    pub fn set_selected(&self, selected: bool) {
        self.selected.store(selected, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_keeps_identity_and_selection() {
        let id = ClientId::generate();
        let view = ClientView::new(ClientRecord::new(id, "rig-a"));
        view.set_selected(true);

        let mut next = ClientRecord::new(id, "rig-a");
        next.main_coin_speed = 42.0;
        view.update(next);

        assert!(view.is_selected());
        assert!((view.record().main_coin_speed - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn update_ignores_foreign_record() {
        let view = ClientView::new(ClientRecord::new(ClientId::generate(), "rig-a"));
        view.update(ClientRecord::new(ClientId::generate(), "rig-b"));
        assert_eq!(view.record().miner_name, "rig-a");
    }

    #[test]
    fn sparse_json_uses_defaults() {
        let id = ClientId::generate();
        let json = format!(r#"{{"id":"{id}","miner_name":"rig","is_mining":true}}"#);
        let record: ClientRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.id, id);
        assert!(record.is_mining);
        assert_eq!(record.gpu_type, GpuType::Empty);
        assert_eq!(record.last_active_on, DateTime::<Utc>::UNIX_EPOCH);
    }
}
