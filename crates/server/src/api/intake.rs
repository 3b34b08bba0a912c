//! `/insert_new_announcement` — the BroadcastFrontend's sole intake
//! endpoint (§4.8). StoreWorker POSTs each accepted filing here; this
//! handler applies the §4.8 filter and, if it passes, pushes the payload
//! to every WebSocket client in room `"all"`.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use pipeline_core::StoredFiling;
use serde::Serialize;

use crate::filter::should_broadcast;
use crate::live::filing_message;
use crate::state::AppState;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct IntakeResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[utoipa::path(
    post,
    path = "/insert_new_announcement",
    tag = "Broadcast",
    request_body = Object,
    responses(
        (status = 200, description = "Accepted or filtered out", body = IntakeResponse),
        (status = 422, description = "Malformed payload", body = IntakeResponse)
    )
)]
pub async fn insert_new_announcement(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> (StatusCode, Json<IntakeResponse>) {
    state.metrics.received.fetch_add(1, Ordering::Relaxed);

    let filing: StoredFiling = match serde_json::from_slice(&body) {
        Ok(f) => f,
        Err(e) => {
            state.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "malformed /insert_new_announcement body");
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(IntakeResponse { status: "error", reason: Some("malformed payload") }));
        }
    };

    if !should_broadcast(&filing) {
        state.metrics.skipped.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::OK, Json(IntakeResponse { status: "skipped", reason: Some("filtered by intake rule") }));
    }

    let _ = state.broadcast.send(filing_message(&filing));
    state.metrics.accepted.fetch_add(1, Ordering::Relaxed);
    (StatusCode::OK, Json(IntakeResponse { status: "success", reason: None }))
}
