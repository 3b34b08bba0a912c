//! verification-janitor — runs the cleanup cycle every `cleanup_interval`
//! seconds until shut down, the way `queue_manager.py`'s `run()` loop did,
//! subtracting the cycle's own runtime from the wait so cycles don't drift.

use pipeline_queue::{QueueConfig, RedisQueueBroker};
use verification::{VerificationConfig, VerificationStore};

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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pipeline_core::config::load_dotenv();
    pipeline_core::config::init_tracing();

    let config = VerificationConfig::from_env();
    config.log_summary();

    if !config.enabled {
        tracing::info!("verification queue management disabled by configuration, exiting");
        return Ok(());
    }

    let store = VerificationStore::connect(&config).await?;

    let queue_config = QueueConfig::from_env();
    queue_config.log_summary();
    let broker = RedisQueueBroker::connect(&queue_config).await?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tracing::info!("verification janitor starting");

    loop {
        let cycle_start = tokio::time::Instant::now();

        match verification::janitor::run_cycle(&store, &broker, &config).await {
            Ok(stats) => tracing::info!(
                expired_sessions = stats.expired_sessions_cleaned,
                orphaned_released = stats.orphaned_tasks_released,
                timeouts_released = stats.timeout_tasks_released,
                dead_lettered = stats.tasks_dead_lettered,
                queued = stats.queued_tasks,
                in_progress = stats.in_progress_tasks,
                active_verifiers = stats.active_verifiers,
                notified = stats.notified,
                "cleanup cycle complete"
            ),
            Err(e) => tracing::error!(error = %e, "cleanup cycle failed"),
        }

        let elapsed = cycle_start.elapsed();
        let interval = std::time::Duration::from_secs(config.cleanup_interval_secs);
        let wait = interval.saturating_sub(elapsed);

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("verification janitor received shutdown signal, stopping");
                return Ok(());
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }
}
