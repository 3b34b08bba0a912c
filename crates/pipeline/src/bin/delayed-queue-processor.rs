//! delayed-queue-processor — the long-lived singleton that drains each
//! queue's `:delayed` sorted set back onto its live list under the adaptive
//! gap policy (§4.7), and alongside it runs the requeue sweep that recovers
//! jobs orphaned by a crashed worker's processing list (§4.5, §9). The
//! supervisor keeps exactly one of these alive at all times; it is not
//! spawned per-batch like the ephemeral workers.

use std::sync::Arc;
use std::time::Duration;

use pipeline_queue::{QueueBroker, QueueConfig, RedisQueueBroker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pipeline_core::config::load_dotenv();
    pipeline_core::config::init_tracing();

    let queue_config = QueueConfig::from_env();
    let queue: Arc<dyn QueueBroker> = Arc::new(RedisQueueBroker::connect(&queue_config).await?);

    let delayed_config = pipeline::DelayedQueueConfig::from_env();
    let sweep_ttl = Duration::from_secs(pipeline_core::config::profiled_env_u64(
        &pipeline_core::config::active_profile(),
        "REQUEUE_SWEEP_TTL_SECS",
        90,
    ));
    let sweep_poll = Duration::from_secs(pipeline_core::config::profiled_env_u64(
        &pipeline_core::config::active_profile(),
        "REQUEUE_SWEEP_POLL_SECS",
        30,
    ));

    let delayed_queue = Arc::clone(&queue);
    let requeue_queue = Arc::clone(&queue);

    let mut shutdown = std::pin::pin!(shutdown_signal());
    tokio::select! {
        result = pipeline::delayed_queue_processor::run_forever(delayed_queue, delayed_config) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "delayed queue sweep loop exited");
            }
        }
        result = pipeline::delayed_queue_processor::run_requeue_sweep_forever(requeue_queue, sweep_ttl, sweep_poll) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "requeue sweep loop exited");
            }
        }
        _ = &mut shutdown => {
            tracing::info!("delayed-queue-processor received shutdown signal");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
