//! Read-only REST API over a finished run.
//!
//! Provides GET endpoints:
//! - `/state`: strategy, KPI report, site impact, and latest step
//! - `/telemetry`: per-step site results with optional range filtering
//! - `/vehicles`: per-vehicle summaries
//! - `/unmet`: vehicles that left below target
//! - `/ledger`: per-entity records, filterable by entity and range

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::sim::ev_system::RunOutcome;

pub use types::{ErrorResponse, LedgerQuery, LedgerRecord, RangeQuery, StateResponse};

/// Immutable application state shared across all request handlers.
///
/// Constructed once after the run completes and wrapped in `Arc`; all data
/// is read-only.
pub struct AppState {
    pub outcome: RunOutcome,
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/telemetry", get(handlers::get_telemetry))
        .route("/vehicles", get(handlers::get_vehicles))
        .route("/unmet", get(handlers::get_unmet))
        .route("/ledger", get(handlers::get_ledger))
        .with_state(state)
}

/// Binds to the given address and serves the API until the process stops.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
