//! `/health`, `/health/live` and `/health/ready`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::network::HealthState;

/// Body of `GET /health`.
///
/// `pending_mutations` counts update/delete calls that were answered but are
/// still running against the store. During `draining` it shows how much
/// detached work is holding shutdown back.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub state: HealthState,
    pub in_flight: usize,
    pub pending_mutations: usize,
    pub uptime_secs: u64,
}

/// Always 200; callers read `state` to tell "up but draining" from "up".
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        state: state.shutdown.health_state(),
        in_flight: state.shutdown.in_flight_count(),
        pending_mutations: state.dispatcher.pending_mutations(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Process is responsive. The store is not consulted.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// 200 while `Ready`, 503 before startup completes and once draining begins.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state().accepts_traffic() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
