//! In-memory fleet client for testing.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use hashfleet_core::{
    ClientId, LocalIpsRequest, OperationResult, UpgradeRequest, VirtualMemoryRequest, WorkId,
};
use parking_lot::Mutex;

use crate::client::FleetClient;
use crate::error::{Result, StudioError};
use crate::query::{QueryClientsRequest, QueryClientsResponse};

/// A [`FleetClient`] that answers from memory and records every call.
#[derive(Debug, Default)]
pub struct MockFleetClient {
    response: Mutex<QueryClientsResponse>,
    query_error: Mutex<Option<String>>,
    query_panics: Mutex<bool>,
    offline: Mutex<HashSet<ClientId>>,
    queries: Mutex<Vec<QueryClientsRequest>>,
    calls: Mutex<Vec<(&'static str, ClientId)>>,
    results: Mutex<Vec<OperationResult>>,
}

impl MockFleetClient {
    /// A client answering every query with an empty page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries with `response` from now on.
    pub fn set_response(&self, response: QueryClientsResponse) {
        *self.response.lock() = response;
    }

    /// Fail queries with a transport error, or stop failing with `None`.
    pub fn fail_queries(&self, message: Option<&str>) {
        *self.query_error.lock() = message.map(ToString::to_string);
    }

    /// Panic inside `query_clients` while `on` is set.
    pub fn panic_on_query(&self, on: bool) {
        *self.query_panics.lock() = on;
    }

    /// Make node commands for `client_id` fail.
    pub fn set_offline(&self, client_id: ClientId) {
        self.offline.lock().insert(client_id);
    }

    /// Results returned by `get_operation_results`.
    pub fn set_operation_results(&self, results: Vec<OperationResult>) {
        *self.results.lock() = results;
    }

    /// Queries received, in order.
    #[must_use]
    pub fn queries(&self) -> Vec<QueryClientsRequest> {
        self.queries.lock().clone()
    }

    /// Node calls received, as `(operation, client)` pairs.
    #[must_use]
    pub fn calls(&self) -> Vec<(&'static str, ClientId)> {
        self.calls.lock().clone()
    }

    fn node_call(&self, operation: &'static str, client_id: ClientId) -> Result<()> {
        self.calls.lock().push((operation, client_id));
        if self.offline.lock().contains(&client_id) {
            return Err(StudioError::Server {
                status: 502,
                message: format!("client {client_id} is offline"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FleetClient for MockFleetClient {
    async fn query_clients(&self, request: &QueryClientsRequest) -> Result<QueryClientsResponse> {
        self.queries.lock().push(request.clone());
        let panics = *self.query_panics.lock();
        if panics {
            panic!("fleet query handler panicked");
        }
        if let Some(message) = self.query_error.lock().clone() {
            return Err(StudioError::Transport(message));
        }
        Ok(self.response.lock().clone())
    }

    async fn update_client(
        &self,
        client_id: ClientId,
        _property: &str,
        _value: serde_json::Value,
    ) -> Result<()> {
        self.node_call("update_client", client_id)
    }

    async fn update_clients(
        &self,
        _property: &str,
        values: HashMap<ClientId, serde_json::Value>,
    ) -> Result<()> {
        values
            .into_keys()
            .try_for_each(|id| self.node_call("update_clients", id))
    }

    async fn remove_clients(&self, client_ids: &[ClientId]) -> Result<()> {
        client_ids
            .iter()
            .try_for_each(|id| self.node_call("remove_clients", *id))
    }

    async fn start_mine(&self, client_id: ClientId, _work_id: Option<WorkId>) -> Result<()> {
        self.node_call("start_mine", client_id)
    }

    async fn stop_mine(&self, client_id: ClientId) -> Result<()> {
        self.node_call("stop_mine", client_id)
    }

    async fn upgrade(&self, client_id: ClientId, _request: &UpgradeRequest) -> Result<()> {
        self.node_call("upgrade", client_id)
    }

    async fn set_virtual_memory(
        &self,
        client_id: ClientId,
        _request: &VirtualMemoryRequest,
    ) -> Result<()> {
        self.node_call("set_virtual_memory", client_id)
    }

    async fn set_local_ips(&self, client_id: ClientId, _request: &LocalIpsRequest) -> Result<()> {
        self.node_call("set_local_ips", client_id)
    }

    async fn switch_radeon_gpu(&self, client_id: ClientId, _compute_mode: bool) -> Result<()> {
        self.node_call("switch_radeon_gpu", client_id)
    }

    async fn get_operation_results(
        &self,
        client_id: ClientId,
        after: i64,
    ) -> Result<Vec<OperationResult>> {
        self.node_call("get_operation_results", client_id)?;
        Ok(self
            .results
            .lock()
            .iter()
            .filter(|r| r.timestamp > after)
            .cloned()
            .collect())
    }
}
