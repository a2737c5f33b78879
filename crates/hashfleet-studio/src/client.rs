//! HTTP client for the fleet server.
//!
//! The studio never talks to nodes directly: every query and command goes
//! through the fleet server, which relays node operations to each node's
//! daemon.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hashfleet_core::{
    ClientId, LocalIpsRequest, OperationResult, RadeonSwitchRequest, UpgradeRequest,
    VirtualMemoryRequest, WorkId,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::query::{QueryClientsRequest, QueryClientsResponse};

/// Operations the studio performs against the fleet.
///
/// This trait abstracts the fleet server so tests can use an in-memory mock.
#[async_trait]
pub trait FleetClient: Send + Sync {
    /// Run a paged fleet query.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    async fn query_clients(&self, request: &QueryClientsRequest) -> Result<QueryClientsResponse>;

    /// Set one property of one node record.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn update_client(
        &self,
        client_id: ClientId,
        property: &str,
        value: serde_json::Value,
    ) -> Result<()>;

    /// Set one property on several node records.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn update_clients(
        &self,
        property: &str,
        values: HashMap<ClientId, serde_json::Value>,
    ) -> Result<()>;

    /// Forget nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn remove_clients(&self, client_ids: &[ClientId]) -> Result<()>;

    /// Start mining on a node, optionally under assigned work.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn start_mine(&self, client_id: ClientId, work_id: Option<WorkId>) -> Result<()>;

    /// Stop mining on a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn stop_mine(&self, client_id: ClientId) -> Result<()>;

    /// Upgrade the node software.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn upgrade(&self, client_id: ClientId, request: &UpgradeRequest) -> Result<()>;

    /// Set page file sizes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn set_virtual_memory(
        &self,
        client_id: ClientId,
        request: &VirtualMemoryRequest,
    ) -> Result<()>;

    /// Set adapter network settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn set_local_ips(&self, client_id: ClientId, request: &LocalIpsRequest) -> Result<()>;

    /// Switch AMD GPUs between graphics and compute mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn switch_radeon_gpu(&self, client_id: ClientId, compute_mode: bool) -> Result<()>;

    /// Operation results recorded by a node after `after` (unix ms).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    async fn get_operation_results(
        &self,
        client_id: ClientId,
        after: i64,
    ) -> Result<Vec<OperationResult>>;
}

/// [`FleetClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFleetClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct UpdateClientBody<'a> {
    property: &'a str,
    value: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct UpdateClientsBody<'a> {
    property: &'a str,
    values: HashMap<ClientId, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct RemoveClientsBody<'a> {
    ids: &'a [ClientId],
}

#[derive(Debug, Serialize)]
struct StartMineBody {
    work_id: Option<WorkId>,
}

/// Error body returned by the fleet server.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl HttpFleetClient {
    /// Create a client for the fleet server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::Internal` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| StudioError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The fleet server URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client_url(&self, client_id: ClientId, path: &str) -> String {
        format!("{}/v1/clients/{client_id}{path}", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| StudioError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("fleet server returned status {status}"));
        tracing::warn!(status = %status, error = %message, "Fleet request rejected");
        Err(StudioError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn post<B: Serialize + Sync>(&self, url: String, body: &B) -> Result<()> {
        self.send(self.client.post(url).json(body)).await.map(drop)
    }
}

#[async_trait]
impl FleetClient for HttpFleetClient {
    async fn query_clients(&self, request: &QueryClientsRequest) -> Result<QueryClientsResponse> {
        let url = format!("{}/v1/clients/query", self.base_url);
        let response = self.send(self.client.post(url).json(request)).await?;
        let body = response
            .json::<QueryClientsResponse>()
            .await
            .map_err(|e| StudioError::Decode(e.to_string()))?;
        tracing::debug!(
            rows = body.data.len(),
            total = body.total,
            page = request.page_index,
            "Fleet query answered"
        );
        Ok(body)
    }

    async fn update_client(
        &self,
        client_id: ClientId,
        property: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let body = UpdateClientBody { property, value };
        self.send(self.client.patch(self.client_url(client_id, "")).json(&body))
            .await
            .map(drop)
    }

    async fn update_clients(
        &self,
        property: &str,
        values: HashMap<ClientId, serde_json::Value>,
    ) -> Result<()> {
        let url = format!("{}/v1/clients", self.base_url);
        let body = UpdateClientsBody { property, values };
        self.send(self.client.patch(url).json(&body)).await.map(drop)
    }

    async fn remove_clients(&self, client_ids: &[ClientId]) -> Result<()> {
        let url = format!("{}/v1/clients/remove", self.base_url);
        self.post(url, &RemoveClientsBody { ids: client_ids }).await
    }

    async fn start_mine(&self, client_id: ClientId, work_id: Option<WorkId>) -> Result<()> {
        self.post(self.client_url(client_id, "/mine/start"), &StartMineBody { work_id })
            .await
    }

    async fn stop_mine(&self, client_id: ClientId) -> Result<()> {
        self.send(self.client.post(self.client_url(client_id, "/mine/stop")))
            .await
            .map(drop)
    }

    async fn upgrade(&self, client_id: ClientId, request: &UpgradeRequest) -> Result<()> {
        self.post(self.client_url(client_id, "/upgrade"), request).await
    }

    async fn set_virtual_memory(
        &self,
        client_id: ClientId,
        request: &VirtualMemoryRequest,
    ) -> Result<()> {
        self.post(self.client_url(client_id, "/virtual-memory"), request)
            .await
    }

    async fn set_local_ips(&self, client_id: ClientId, request: &LocalIpsRequest) -> Result<()> {
        self.post(self.client_url(client_id, "/local-ips"), request).await
    }

    async fn switch_radeon_gpu(&self, client_id: ClientId, compute_mode: bool) -> Result<()> {
        self.post(
            self.client_url(client_id, "/radeon/switch"),
            &RadeonSwitchRequest { compute_mode },
        )
        .await
    }

    async fn get_operation_results(
        &self,
        client_id: ClientId,
        after: i64,
    ) -> Result<Vec<OperationResult>> {
        let url = self.client_url(client_id, "/operation-results");
        let response = self
            .send(self.client.get(url).query(&[("after", after)]))
            .await?;
        response
            .json::<Vec<OperationResult>>()
            .await
            .map_err(|e| StudioError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FleetQuery;
    use crate::record::ClientRecord;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpFleetClient {
        HttpFleetClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn query_decodes_response() {
        let server = MockServer::start().await;
        let record = ClientRecord::new(ClientId::generate(), "rig-01");
        Mock::given(method("POST"))
            .and(path("/v1/clients/query"))
            .and(body_partial_json(json!({"page_index": 1, "sort_field": "miner_name"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [record],
                "total": 1,
                "total_mining_count": 1,
                "total_online_count": 1,
                "latest_snapshots": [{"coin_code": "ETC", "mining_count": 1, "online_count": 1}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server)
            .query_clients(&FleetQuery::default().to_request())
            .await
            .unwrap();

        assert_eq!(response.total, 1);
        assert_eq!(response.data[0].miner_name, "rig-01");
        assert_eq!(response.latest_snapshots[0].coin_code, "ETC");
    }

    #[tokio::test]
    async fn server_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/clients/query"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"error": "database offline"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .query_clients(&FleetQuery::default().to_request())
            .await
            .unwrap_err();

        match err {
            StudioError::Server { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "database offline");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_without_body_reports_status() {
        let server = MockServer::start().await;
        let id = ClientId::generate();
        Mock::given(method("POST"))
            .and(path(format!("/v1/clients/{id}/mine/stop")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).stop_mine(id).await.unwrap_err();
        assert!(err.to_string().contains("404"), "{err}");
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn node_commands_hit_client_routes() {
        let server = MockServer::start().await;
        let id = ClientId::generate();
        let work = WorkId::generate();
        Mock::given(method("POST"))
            .and(path(format!("/v1/clients/{id}/mine/start")))
            .and(body_partial_json(json!({"work_id": work.to_string()})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/clients/{id}/radeon/switch")))
            .and(body_partial_json(json!({"compute_mode": true})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server);
        c.start_mine(id, Some(work)).await.unwrap();
        c.switch_radeon_gpu(id, true).await.unwrap();
    }

    #[tokio::test]
    async fn operation_results_pass_cursor() {
        let server = MockServer::start().await;
        let id = ClientId::generate();
        Mock::given(method("GET"))
            .and(path(format!("/v1/clients/{id}/operation-results")))
            .and(query_param("after", "1700000000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "timestamp": 1_700_000_000_500_i64,
                "operation": "stop_mine",
                "state_code": 200,
                "description": "mining stopped"
            }])))
            .mount(&server)
            .await;

        let results = client(&server)
            .get_operation_results(id, 1_700_000_000_000)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let c = HttpFleetClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = c.remove_clients(&[ClientId::generate()]).await.unwrap_err();
        assert!(matches!(err, StudioError::Transport(_)));
        assert!(err.is_retriable());
    }
}
