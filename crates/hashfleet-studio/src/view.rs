//! The fleet reconciliation engine.
//!
//! [`FleetView`] keeps the locally held page of nodes in step with the fleet
//! server. Each poll response is merged into an index of identity-stable
//! [`ClientView`]s keyed by [`ClientId`], plus an ordered list of IDs.
//!
//! ```text
//!   response (tagged with the sort it was requested under)
//!        │
//!        ├── same sort as last time ──► merge in place
//!        │                                drop missing IDs
//!        │                                update known IDs, keep their position
//!        │                                insert new IDs at their response index
//!        │
//!        └── sort changed ──────────────► merge, then stable re-sort
//!                                         by the new field and direction
//!        │
//!        ▼
//!   Arc<FleetPage> published on a watch channel
//! ```
//!
//! The view is owned by a single consumer task ([`FleetView::spawn`]).
//! Updates reach it over an mpsc channel; readers only ever see a complete
//! published page.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hashfleet_core::ClientId;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{Result, StudioError};
use crate::highlight::{HighlightThresholds, RowHighlight};
use crate::query::{CoinSnapshot, QueryClientsResponse};
use crate::record::{ClientRecord, ClientView};
use crate::sort::ActiveSort;

/// Coin code of the fleet-wide snapshot row.
pub const ALL_COINS: &str = "all";

/// Capacity of the update channel.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// A poll response together with the query it answers.
#[derive(Debug, Clone)]
pub struct ClientsUpdate {
    /// The sort the request was issued under.
    pub sort: ActiveSort,
    /// The requested page.
    pub page_index: u32,
    /// The requested page size.
    pub page_size: u32,
    /// The server response.
    pub response: QueryClientsResponse,
}

/// Which reconciliation path an update took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPath {
    /// Merged in place, positions of known nodes kept.
    Merged,
    /// Merged and re-sorted because the sort changed.
    Rebuilt,
}

/// Paging state derived from a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Paging {
    /// One-based page index; 0 when there are no records.
    pub page_index: u32,
    /// Rows per page.
    pub page_size: u32,
    /// Matching records across all pages.
    pub total: u32,
    /// Number of pages.
    pub page_count: u32,
    /// A previous page exists.
    pub can_page_up: bool,
    /// A next page exists.
    pub can_page_down: bool,
}

impl Paging {
    /// Derive paging state.
    #[must_use]
    pub const fn compute(page_index: u32, page_size: u32, total: u32) -> Self {
        let page_count = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        let page_index = if total == 0 {
            0
        } else if page_index == 0 {
            1
        } else {
            page_index
        };
        Self {
            page_index,
            page_size,
            total,
            page_count,
            can_page_up: page_index > 1,
            can_page_down: page_index < page_count,
        }
    }
}

/// One row of a published page.
#[derive(Debug, Clone)]
pub struct FleetRow {
    /// The node.
    pub view: Arc<ClientView>,
    /// Its highlight flags at publish time.
    pub highlight: RowHighlight,
}

/// An immutable snapshot of the fleet view.
#[derive(Debug, Clone, Default)]
pub struct FleetPage {
    /// Rows in display order.
    pub rows: Vec<FleetRow>,
    /// Sort the rows are ordered by; `None` before the first response.
    pub sort: Option<ActiveSort>,
    /// Paging state.
    pub paging: Paging,
    /// Fleet-wide mining and online counts.
    pub all: CoinSnapshot,
    /// Counts per known coin, in catalog order.
    pub coins: Vec<CoinSnapshot>,
    /// Incremented on every publish.
    pub version: u64,
}

impl FleetPage {
    /// Row identities in display order.
    #[must_use]
    pub fn ids(&self) -> Vec<ClientId> {
        self.rows.iter().map(|row| row.view.id()).collect()
    }

    /// Find a row by identity.
    #[must_use]
    pub fn get(&self, id: ClientId) -> Option<&FleetRow> {
        self.rows.iter().find(|row| row.view.id() == id)
    }

    /// Rows the operator selected.
    #[must_use]
    pub fn selected(&self) -> Vec<ClientId> {
        self.rows
            .iter()
            .filter(|row| row.view.is_selected())
            .map(|row| row.view.id())
            .collect()
    }
}

/// Consumer-owned reconciliation state.
#[derive(Debug)]
pub struct FleetView {
    index: HashMap<ClientId, Arc<ClientView>>,
    order: Vec<ClientId>,
    last_sort: Option<ActiveSort>,
    known_coins: Vec<String>,
    thresholds: HighlightThresholds,
    page: Arc<FleetPage>,
}

impl FleetView {
    /// An empty view. `known_coins` lists the coin codes that get a snapshot row.
    #[must_use]
    pub fn new(known_coins: Vec<String>, thresholds: HighlightThresholds) -> Self {
        let coins = known_coins.iter().map(CoinSnapshot::empty).collect();
        Self {
            index: HashMap::new(),
            order: Vec::new(),
            last_sort: None,
            known_coins,
            thresholds,
            page: Arc::new(FleetPage {
                all: CoinSnapshot::empty(ALL_COINS),
                coins,
                ..FleetPage::default()
            }),
        }
    }

    /// The last published page.
    #[must_use]
    pub fn page(&self) -> Arc<FleetPage> {
        Arc::clone(&self.page)
    }

    /// The view of a node currently on the page.
    #[must_use]
    pub fn view(&self, id: ClientId) -> Option<Arc<ClientView>> {
        self.index.get(&id).cloned()
    }

    /// Number of nodes on the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the page is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Merge a poll response and publish a new page.
    pub fn apply(&mut self, update: ClientsUpdate) -> ApplyPath {
        let path = if self.last_sort == Some(update.sort) {
            ApplyPath::Merged
        } else {
            ApplyPath::Rebuilt
        };

        let (added, removed) = self.merge(update.response.data);
        if path == ApplyPath::Rebuilt {
            self.resort(update.sort);
            self.last_sort = Some(update.sort);
        }

        tracing::debug!(
            path = ?path,
            added,
            removed,
            rows = self.order.len(),
            total = update.response.total,
            "Fleet page reconciled"
        );

        let paging = Paging::compute(update.page_index, update.page_size, update.response.total);
        let all = CoinSnapshot {
            coin_code: ALL_COINS.to_string(),
            mining_count: update.response.total_mining_count,
            online_count: update.response.total_online_count,
        };
        let coins = self
            .known_coins
            .iter()
            .map(|code| {
                update
                    .response
                    .latest_snapshots
                    .iter()
                    .find(|s| &s.coin_code == code)
                    .cloned()
                    .unwrap_or_else(|| CoinSnapshot::empty(code))
            })
            .collect();

        self.publish(paging, all, coins);
        path
    }

    /// Change the highlight thresholds and republish.
    pub fn set_thresholds(&mut self, thresholds: HighlightThresholds) {
        self.thresholds = thresholds;
        let page = Arc::clone(&self.page);
        self.publish(page.paging, page.all.clone(), page.coins.clone());
    }

    fn merge(&mut self, data: Vec<ClientRecord>) -> (usize, usize) {
        let incoming: HashSet<ClientId> = data.iter().map(|r| r.id).collect();
        let before = self.order.len();
        self.order.retain(|id| incoming.contains(id));
        self.index.retain(|id, _| incoming.contains(id));
        let removed = before - self.order.len();

        let mut added = 0;
        for (i, record) in data.into_iter().enumerate() {
            if let Some(view) = self.index.get(&record.id) {
                view.update(record);
            } else {
                let id = record.id;
                let position = i.min(self.order.len());
                self.index.insert(id, Arc::new(ClientView::new(record)));
                self.order.insert(position, id);
                added += 1;
            }
        }
        (added, removed)
    }

    fn resort(&mut self, sort: ActiveSort) {
        let mut keyed: Vec<(ClientId, ClientRecord)> = self
            .order
            .iter()
            .filter_map(|id| self.index.get(id).map(|view| (*id, view.record())))
            .collect();
        keyed.sort_by(|(_, a), (_, b)| sort.compare(a, b));
        self.order = keyed.into_iter().map(|(id, _)| id).collect();
    }

    fn publish(&mut self, paging: Paging, all: CoinSnapshot, coins: Vec<CoinSnapshot>) {
        let rows = self
            .order
            .iter()
            .filter_map(|id| self.index.get(id))
            .map(|view| FleetRow {
                view: Arc::clone(view),
                highlight: view.with_record(|r| self.thresholds.evaluate(r)),
            })
            .collect();
        self.page = Arc::new(FleetPage {
            rows,
            sort: self.last_sort,
            paging,
            all,
            coins,
            version: self.page.version + 1,
        });
    }

    /// Move the view onto its own consumer task.
    ///
    /// The task applies updates in arrival order and publishes each new page
    /// on the returned handle's watch channel. It ends when every handle is
    /// dropped.
    #[must_use]
    pub fn spawn(mut self) -> (FleetHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let (page_tx, page_rx) = watch::channel(self.page());

        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    ViewMessage::Apply(update) => {
                        self.apply(update);
                    }
                    ViewMessage::SetThresholds(thresholds) => self.set_thresholds(thresholds),
                }
                page_tx.send_replace(self.page());
            }
            tracing::debug!("Fleet view consumer stopped");
        });

        (
            FleetHandle {
                updates: tx,
                page: page_rx,
            },
            task,
        )
    }
}

#[derive(Debug)]
enum ViewMessage {
    Apply(ClientsUpdate),
    SetThresholds(HighlightThresholds),
}

/// Sends updates to a spawned [`FleetView`] and reads its pages.
#[derive(Debug, Clone)]
pub struct FleetHandle {
    updates: mpsc::Sender<ViewMessage>,
    page: watch::Receiver<Arc<FleetPage>>,
}

impl FleetHandle {
    /// Queue a poll response.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::ViewClosed` if the consumer task is gone.
    pub async fn apply(&self, update: ClientsUpdate) -> Result<()> {
        self.updates
            .send(ViewMessage::Apply(update))
            .await
            .map_err(|_| StudioError::ViewClosed)
    }

    /// Queue a threshold change.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::ViewClosed` if the consumer task is gone.
    pub async fn set_thresholds(&self, thresholds: HighlightThresholds) -> Result<()> {
        self.updates
            .send(ViewMessage::SetThresholds(thresholds))
            .await
            .map_err(|_| StudioError::ViewClosed)
    }

    /// The latest published page.
    #[must_use]
    pub fn current(&self) -> Arc<FleetPage> {
        Arc::clone(&*self.page.borrow())
    }

    /// A receiver notified on every publish.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<FleetPage>> {
        self.page.clone()
    }
}
