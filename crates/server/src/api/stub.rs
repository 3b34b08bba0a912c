//! Stub placeholders for the external CRUD surface spec.md puts out of
//! scope (§1 Non-goals: watchlists, saved items, stock-price proxy, auth).
//! Mounted so the router shape documents the full external API without
//! implementing the out-of-scope collaborator.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct NotImplementedResponse {
    pub status: &'static str,
    pub message: &'static str,
}

async fn not_implemented(feature: &'static str) -> (StatusCode, Json<NotImplementedResponse>) {
    (StatusCode::NOT_IMPLEMENTED, Json(NotImplementedResponse { status: "not_implemented", message: feature }))
}

pub async fn watchlists() -> (StatusCode, Json<NotImplementedResponse>) {
    not_implemented("watchlist CRUD is out of scope").await
}

pub async fn saved_items() -> (StatusCode, Json<NotImplementedResponse>) {
    not_implemented("saved-items CRUD is out of scope").await
}

pub async fn stock_price() -> (StatusCode, Json<NotImplementedResponse>) {
    not_implemented("stock-price proxy is out of scope").await
}

pub async fn auth() -> (StatusCode, Json<NotImplementedResponse>) {
    not_implemented("auth is out of scope").await
}
