use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::config::Algorithm;
use crate::load_balancer::BackendStatus;
use crate::telemetry::{PoolSnapshot, TelemetryEvent};

/// Records returned by `/admin/events` when no limit is given.
pub const DEFAULT_EVENTS_LIMIT: usize = 100;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub algorithm: Algorithm,
    pub backends_total: usize,
    pub backends_healthy: usize,
    pub uptime_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let healthy = state
        .pool
        .backends()
        .iter()
        .filter(|b| b.is_healthy())
        .count();

    let status = if healthy == 0 { "degraded" } else { "operational" };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: status.to_string(),
        algorithm: state.pool.algorithm(),
        backends_total: state.pool.len(),
        backends_healthy: healthy,
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    Json(state.pool.statuses())
}

/// Latest published snapshot, or a fresh one if none was published yet.
pub async fn get_snapshot(State(state): State<AdminState>) -> Json<PoolSnapshot> {
    let snapshot = state
        .events
        .latest_snapshot()
        .unwrap_or_else(|| PoolSnapshot::capture(&state.pool));
    Json(snapshot)
}

pub async fn get_events(
    State(state): State<AdminState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<TelemetryEvent>> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENTS_LIMIT);
    Json(state.events.recent(limit))
}
