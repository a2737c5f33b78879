//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, host, mine, operations, stats};
use crate::state::NodeState;

/// Create the node router with all routes and middleware.
///
/// # Routes
///
/// - `GET /health` - Health check
/// - `POST /v1/mine/start` - Start or restart mining, optionally under a work
/// - `POST /v1/mine/stop` - Stop mining
/// - `GET /v1/mine/state` - Phase and locked context
/// - `POST /v1/stats` - Hash rate and share totals from the running kernel
/// - `POST /v1/upgrade` - Upgrade node software
/// - `POST /v1/virtual-memory` - Resize paging files
/// - `POST /v1/local-ips` - Reconfigure network adapters
/// - `POST /v1/radeon/switch` - Switch Radeon compute mode
/// - `POST /v1/autoboot` - Set autostart flags
/// - `GET /v1/operation-results?after=<ms>` - Recent operation results
pub fn create_router(state: NodeState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    Router::new()
        .route("/health", get(health::health))
        // Mining
        .route("/v1/mine/start", post(mine::start_mine))
        .route("/v1/mine/stop", post(mine::stop_mine))
        .route("/v1/mine/state", get(mine::mine_state))
        .route("/v1/stats", post(stats::report_stats))
        // Host
        .route("/v1/upgrade", post(host::upgrade))
        .route("/v1/virtual-memory", post(host::set_virtual_memory))
        .route("/v1/local-ips", post(host::set_local_ips))
        .route("/v1/radeon/switch", post(host::switch_radeon_gpu))
        .route("/v1/autoboot", post(host::set_auto_boot))
        // Observability
        .route("/v1/operation-results", get(operations::operation_results))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
