//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;

use super::AppState;
use super::types::{ErrorResponse, LedgerQuery, LedgerRecord, RangeQuery, StateResponse};
use crate::sim::types::{StepResult, UnmetTarget, VehicleSummary};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))
}

/// Returns strategy, KPIs, site impact and the latest step.
///
/// `GET /state` → 200 + `StateResponse` JSON
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    let o = &state.outcome;
    Json(StateResponse {
        strategy: o.strategy,
        steps: o.steps.len(),
        dt_hours: o.dt_hours,
        kpi: o.kpi.clone(),
        site_impact: o.site_impact.clone(),
        latest_step: o.steps.last().cloned(),
    })
}

/// Returns step results, optionally filtered by timestep range.
///
/// `GET /telemetry` → 200 + `Vec<StepResult>` JSON
/// `GET /telemetry?from=N&to=M` → filtered range (inclusive)
/// `GET /telemetry?from=10&to=5` → 400 + `ErrorResponse`
pub async fn get_telemetry(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<StepResult>>, ApiError> {
    let (from, to) = query.bounds().map_err(bad_request)?;
    let steps: Vec<StepResult> = state
        .outcome
        .steps
        .iter()
        .filter(|r| r.timestep >= from && r.timestep <= to)
        .cloned()
        .collect();
    Ok(Json(steps))
}

/// `GET /vehicles` → 200 + `Vec<VehicleSummary>` JSON
pub async fn get_vehicles(State(state): State<Arc<AppState>>) -> Json<Vec<VehicleSummary>> {
    Json(state.outcome.vehicles.clone())
}

/// `GET /unmet` → 200 + `Vec<UnmetTarget>` JSON
pub async fn get_unmet(State(state): State<Arc<AppState>>) -> Json<Vec<UnmetTarget>> {
    Json(state.outcome.unmet_targets.clone())
}

/// Returns ledger records filtered by entity kind, id and range.
///
/// `GET /ledger?entity=vehicle&id=EV_1&from=0&to=47`
pub async fn get_ledger(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<Vec<LedgerRecord>>, ApiError> {
    let (from, to) = query.range().bounds().map_err(bad_request)?;
    let records: Vec<LedgerRecord> = state
        .outcome
        .recorder
        .records()
        .iter()
        .filter(|r| r.timestep >= from && r.timestep <= to && query.matches(r))
        .map(LedgerRecord::from)
        .collect();
    Ok(Json(records))
}
