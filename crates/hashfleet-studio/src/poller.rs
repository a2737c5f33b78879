//! Periodic fleet polling.
//!
//! The [`Poller`] owns the studio's query state. Every 10-second tick it
//! issues the current query in a background task and forwards the response
//! to the fleet view, tagged with the sort the request was built under.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashfleet_bus::{LogLevel, MessageBus, PathGroup, PathOptions, Per10SecondEvent};
use hashfleet_store::SettingsStore;
use parking_lot::Mutex;

use crate::client::FleetClient;
use crate::error::{Result, StudioError};
use crate::events::{ClientsQueriedEvent, ClientsQueryFailedEvent};
use crate::query::{FleetQuery, QueryFilter};
use crate::sort::{ActiveSort, SortField};
use crate::view::{ClientsUpdate, FleetHandle};

/// Issues fleet queries and feeds the view.
pub struct Poller {
    client: Arc<dyn FleetClient>,
    bus: Arc<MessageBus>,
    view: FleetHandle,
    query: Mutex<FleetQuery>,
    settings: Option<Arc<dyn SettingsStore>>,
    in_flight: AtomicBool,
}

impl Poller {
    /// Create a poller starting from `query`.
    #[must_use]
    pub fn new(
        client: Arc<dyn FleetClient>,
        bus: Arc<MessageBus>,
        view: FleetHandle,
        query: FleetQuery,
    ) -> Self {
        Self {
            client,
            bus,
            view,
            query: Mutex::new(query),
            settings: None,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Remember sort selections in `settings`.
    #[must_use]
    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// A copy of the current query state.
    #[must_use]
    pub fn query(&self) -> FleetQuery {
        self.query.lock().clone()
    }

    /// The view this poller feeds.
    #[must_use]
    pub const fn view(&self) -> &FleetHandle {
        &self.view
    }

    /// Select a sort column. The page goes back to 1.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::Store` if the remembered directions cannot be
    /// saved. The selection itself is kept.
    pub fn select_sort(&self, field: SortField) -> Result<ActiveSort> {
        let (active, spec) = {
            let mut query = self.query.lock();
            let active = query.select_sort(field);
            (active, query.sort().clone())
        };
        tracing::debug!(field = %active.field, direction = ?active.direction, "Sort selected");
        if let Some(settings) = &self.settings {
            spec.save(settings.as_ref())?;
        }
        Ok(active)
    }

    /// Change the page size. The page goes back to 1.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::InvalidInput` for an unsupported size.
    pub fn set_page_size(&self, page_size: u32) -> Result<()> {
        self.query.lock().set_page_size(page_size)
    }

    /// Jump to a page.
    pub fn set_page_index(&self, page_index: u32) {
        self.query.lock().set_page_index(page_index);
    }

    /// Replace the filters. The page goes back to 1.
    pub fn set_filter(&self, filter: QueryFilter) {
        let mut query = self.query.lock();
        query.filter = filter;
        query.set_page_index(1);
    }

    /// Run one query and hand the response to the view.
    ///
    /// A failed query is logged and raised as [`ClientsQueryFailedEvent`];
    /// the view keeps its last page.
    ///
    /// # Errors
    ///
    /// Returns the query error, or `StudioError::ViewClosed` if the view is
    /// gone.
    pub async fn poll_once(&self) -> Result<()> {
        let request = self.query.lock().to_request();
        let sort = request.sort();

        let response = match self.client.query_clients(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, retriable = e.is_retriable(), "Fleet query failed");
                self.bus.raise_event(&ClientsQueryFailedEvent {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        tracing::debug!(
            rows = response.data.len(),
            total = response.total,
            page = request.page_index,
            sort = %sort.field,
            "Fleet query answered"
        );
        self.bus.raise_event(&ClientsQueriedEvent {
            sort,
            rows: response.data.len(),
            total: response.total,
        });

        self.view
            .apply(ClientsUpdate {
                sort,
                page_index: request.page_index,
                page_size: request.page_size,
                response,
            })
            .await
    }

    /// Poll in the background. Skipped while a previous poll is running.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::Internal` outside a tokio runtime.
    pub fn trigger(self: &Arc<Self>) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StudioError::Internal(format!("no tokio runtime: {e}")))?;
        spawn_poll(Arc::clone(self), &runtime);
        Ok(())
    }

    /// Poll on every [`Per10SecondEvent`].
    ///
    /// # Errors
    ///
    /// Returns `StudioError::Internal` outside a tokio runtime.
    pub fn attach(self: &Arc<Self>) -> Result<PathGroup> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StudioError::Internal(format!("no tokio runtime: {e}")))?;
        let group = self.bus.new_group();
        let weak = Arc::downgrade(self);
        self.bus
            .register_event_path::<Per10SecondEvent, _>(
                PathOptions::new("poll fleet")
                    .log_level(LogLevel::None)
                    .group(group),
                move |_| match weak.upgrade() {
                    Some(poller) => spawn_poll(poller, &runtime),
                    None => tracing::warn!("Poller dropped; tick ignored"),
                },
            )
            .map_err(|e| StudioError::Internal(e.to_string()))?;
        Ok(group)
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("query", &*self.query.lock())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn spawn_poll(poller: Arc<Poller>, runtime: &tokio::runtime::Handle) {
    if poller.in_flight.swap(true, Ordering::AcqRel) {
        tracing::debug!("Previous fleet poll still running; skipped");
        return;
    }
    runtime.spawn(async move {
        let guard = InFlight(poller);
        // Failures are already logged and raised.
        let _ = guard.0.poll_once().await;
    });
}

/// Clears the in-flight flag when the poll task ends, unwinding included.
struct InFlight(Arc<Poller>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hashfleet_core::ClientId;
    use hashfleet_store::mock::MemorySettingsStore;

    use super::*;
    use crate::highlight::HighlightThresholds;
    use crate::mock::MockFleetClient;
    use crate::query::QueryClientsResponse;
    use crate::record::ClientRecord;
    use crate::sort::{SortDirection, SortSpec};
    use crate::view::FleetView;

    struct Harness {
        client: Arc<MockFleetClient>,
        bus: Arc<MessageBus>,
        poller: Arc<Poller>,
    }

    fn setup() -> Harness {
        let client = Arc::new(MockFleetClient::new());
        let bus = Arc::new(MessageBus::new());
        let (view, _task) = FleetView::new(vec!["ETC".into()], HighlightThresholds::default()).spawn();
        let poller = Arc::new(Poller::new(
            client.clone(),
            Arc::clone(&bus),
            view,
            FleetQuery::default(),
        ));
        Harness {
            client,
            bus,
            poller,
        }
    }

    fn response(names: &[&str]) -> QueryClientsResponse {
        let data: Vec<ClientRecord> = names
            .iter()
            .map(|n| ClientRecord::new(ClientId::generate(), *n))
            .collect();
        QueryClientsResponse {
            total: u32::try_from(data.len()).unwrap(),
            data,
            ..QueryClientsResponse::default()
        }
    }

    #[tokio::test]
    async fn poll_publishes_a_page() {
        let h = setup();
        h.client.set_response(response(&["rig-a", "rig-b"]));
        let mut pages = h.poller.view().subscribe();
        let queried = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&queried);
        h.bus
            .register_event_path::<ClientsQueriedEvent, _>(PathOptions::new("test"), move |e| {
                sink.lock().push(e.total);
            })
            .unwrap();

        h.poller.poll_once().await.unwrap();
        pages.changed().await.unwrap();

        let page = pages.borrow().clone();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.paging.page_count, 1);
        assert_eq!(*queried.lock(), vec![2]);
    }

    #[tokio::test]
    async fn failed_poll_raises_event_and_keeps_page() {
        let h = setup();
        h.client.fail_queries(Some("connection refused"));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        h.bus
            .register_event_path::<ClientsQueryFailedEvent, _>(PathOptions::new("test"), move |e| {
                sink.lock().push(e.message.clone());
            })
            .unwrap();

        let before = h.poller.view().current().version;
        assert!(matches!(
            h.poller.poll_once().await,
            Err(StudioError::Transport(_))
        ));
        assert_eq!(failures.lock().len(), 1);
        assert!(failures.lock()[0].contains("connection refused"));
        assert_eq!(h.poller.view().current().version, before);
    }

    #[tokio::test]
    async fn request_carries_selected_sort_and_page() {
        let h = setup();
        h.poller.set_page_index(3);
        let active = h.poller.select_sort(SortField::CpuTemperature).unwrap();
        assert_eq!(active.direction, SortDirection::Descending);

        h.poller.poll_once().await.unwrap();
        let sent = h.client.queries();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].page_index, 1);
        assert_eq!(sent[0].sort_field, SortField::CpuTemperature);
        assert_eq!(sent[0].sort_direction, SortDirection::Descending);
    }

    #[tokio::test]
    async fn filter_change_resets_the_page() {
        let h = setup();
        h.poller.set_page_index(4);
        h.poller.set_filter(QueryFilter {
            miner_name: "rig".into(),
            ..QueryFilter::default()
        });
        assert_eq!(h.poller.query().page_index(), 1);
        assert_eq!(h.poller.query().filter.miner_name, "rig");
    }

    #[tokio::test]
    async fn sort_selection_is_remembered() {
        let settings = Arc::new(MemorySettingsStore::new());
        let h = setup();
        let poller = Poller::new(
            h.client.clone(),
            Arc::clone(&h.bus),
            h.poller.view().clone(),
            FleetQuery::default(),
        )
        .with_settings(settings.clone());

        poller.select_sort(SortField::DiskSpace).unwrap();
        poller.select_sort(SortField::DiskSpace).unwrap();

        let loaded = SortSpec::load(settings.as_ref());
        assert_eq!(loaded.field(), SortField::DiskSpace);
        assert_eq!(loaded.direction(SortField::DiskSpace), SortDirection::Descending);
    }

    #[tokio::test]
    async fn ticks_trigger_polls() {
        let h = setup();
        h.poller.attach().unwrap();

        h.bus.raise_event(&Per10SecondEvent::new(chrono::Utc::now()));

        tokio::time::timeout(Duration::from_secs(2), async {
            while h.client.queries().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn panicked_poll_does_not_block_later_ticks() {
        let h = setup();
        h.poller.attach().unwrap();
        h.client.panic_on_query(true);
        h.bus.raise_event(&Per10SecondEvent::new(chrono::Utc::now()));
        tokio::time::timeout(Duration::from_secs(2), async {
            while h.client.queries().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        h.client.panic_on_query(false);
        tokio::time::timeout(Duration::from_secs(2), async {
            while h.client.queries().len() < 2 {
                h.bus.raise_event(&Per10SecondEvent::new(chrono::Utc::now()));
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
