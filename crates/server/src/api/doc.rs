//! OpenAPI documentation aggregator, collecting `#[utoipa::path]`-annotated
//! handlers into one spec served via Scalar at `/docs` (teacher's
//! `api/doc.rs` pattern).

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BroadcastFrontend API",
        version = "0.1.0",
        description = "Intake endpoint and WebSocket fan-out for accepted stock-exchange filings.",
    ),
    tags(
        (name = "Health", description = "Server readiness, socket count, and queue status"),
        (name = "Broadcast", description = "Filing intake and push-channel fan-out"),
    ),
    paths(
        crate::api::health::health,
        crate::api::health::socket_health,
        crate::api::health::queue_status,
        crate::api::intake::insert_new_announcement,
    ),
    components(schemas(
        crate::api::health::HealthResponse,
        crate::api::health::SocketHealthResponse,
        crate::api::health::QueueStatusResponse,
        crate::api::intake::IntakeResponse,
    ))
)]
pub struct ApiDoc;
