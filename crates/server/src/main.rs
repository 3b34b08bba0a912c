//! BroadcastFrontend (§4.8): intake endpoint plus WebSocket fan-out to the
//! fixed `"all"` room. Binds and starts serving immediately — there is no
//! background data-loading phase to wait on, unlike the teacher's graph
//! server.

use std::sync::Arc;

use pipeline_queue::{QueueBroker, QueueConfig, RedisQueueBroker};
use server::config::ServerConfig;
use server::state::AppState;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pipeline_core::config::load_dotenv();
    pipeline_core::config::init_tracing();

    let config = ServerConfig::from_env();
    let queue_config = QueueConfig::from_env();
    let queue: Arc<dyn QueueBroker> = Arc::new(RedisQueueBroker::connect(&queue_config).await?);

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, queue);

    let app = server::router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "BroadcastFrontend listening");
    axum::serve(listener, app).await?;

    Ok(())
}
