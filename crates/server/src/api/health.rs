//! Health, socket health, and queue status endpoints (§4.8 ambient,
//! teacher's `api/health.rs` shape).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[utoipa::path(get, path = "/health", tag = "Health", responses((status = 200, body = HealthResponse)))]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SocketHealthResponse {
    pub status: &'static str,
    pub connected_sockets: u64,
}

#[utoipa::path(get, path = "/api/socket/health", tag = "Health", responses((status = 200, body = SocketHealthResponse)))]
pub async fn socket_health(State(state): State<Arc<AppState>>) -> Json<SocketHealthResponse> {
    Json(SocketHealthResponse { status: "ok", connected_sockets: state.socket_count() })
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QueueStatusResponse {
    pub connected: bool,
    pub queue_depths: std::collections::BTreeMap<String, u64>,
    pub intake_received: u64,
    pub intake_accepted: u64,
    pub intake_skipped: u64,
    pub intake_rejected: u64,
}

const WATCHED_QUEUES: &[&str] = &[
    pipeline_core::job::queue_names::AI_PROCESSING,
    pipeline_core::job::queue_names::SUPABASE_UPLOAD,
    pipeline_core::job::queue_names::INVESTOR_PROCESSING,
    pipeline_core::job::queue_names::FAILED_JOBS,
];

/// Backs both `/api/queue_status` and `/api/scraper_status` — the spec
/// names the latter, the rest of the ambient stack names the former; both
/// report the same broker-health snapshot.
#[utoipa::path(get, path = "/api/queue_status", tag = "Health", responses((status = 200, body = QueueStatusResponse)))]
pub async fn queue_status(State(state): State<Arc<AppState>>) -> Json<QueueStatusResponse> {
    let health = state.queue.health_check(WATCHED_QUEUES).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "queue health check failed");
        pipeline_queue::QueueHealth { connected: false, queue_depths: Default::default() }
    });

    Json(QueueStatusResponse {
        connected: health.connected,
        queue_depths: health.queue_depths,
        intake_received: state.metrics.received.load(Ordering::Relaxed),
        intake_accepted: state.metrics.accepted.load(Ordering::Relaxed),
        intake_skipped: state.metrics.skipped.load(Ordering::Relaxed),
        intake_rejected: state.metrics.rejected.load(Ordering::Relaxed),
    })
}
