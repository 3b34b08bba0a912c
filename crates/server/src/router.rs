//! HTTP router construction — assembles routes, CORS, and OpenAPI docs
//! into one `Router` (teacher's `router.rs` pattern).

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::state::AppState;
use crate::{api, live};

pub fn build_router(state: Arc<AppState>) -> Router {
    let app = Router::new()
        .route("/health", get(api::health))
        .route("/api/socket/health", get(api::socket_health))
        .route("/api/queue_status", get(api::queue_status))
        .route("/api/scraper_status", get(api::queue_status))
        .route("/insert_new_announcement", post(api::insert_new_announcement))
        .route("/ws", get(live::ws_upgrade))
        .route("/api/watchlists", get(api::stub::watchlists).post(api::stub::watchlists))
        .route("/api/saved-items", get(api::stub::saved_items).post(api::stub::saved_items))
        .route("/api/stock-price/{symbol}", get(api::stub::stock_price))
        .route("/api/auth/login", post(api::stub::auth));

    app.layer(CorsLayer::permissive())
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::doc::ApiDoc::openapi()))
}
