//! supervisor — WorkerSupervisor (§4.9): samples queue depths on a fixed
//! interval, spawns ephemeral workers per queue up to its concurrency cap
//! with a cool-down, reaps children, and keeps exactly one long-lived
//! `delayed-queue-processor` child alive for the lifetime of the supervisor.

use std::process::Stdio;
use std::sync::Arc;

use pipeline::SupervisorConfig;
use pipeline_queue::{QueueBroker, QueueConfig, RedisQueueBroker};
use tokio::process::{Child, Command};

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

fn spawn_delayed_queue_processor(log_dir: &str) -> anyhow::Result<Child> {
    std::fs::create_dir_all(log_dir)?;
    let stdout = std::fs::OpenOptions::new().create(true).append(true).open(format!("{log_dir}/delayed-queue-processor.out.log"))?;
    let stderr = std::fs::OpenOptions::new().create(true).append(true).open(format!("{log_dir}/delayed-queue-processor.err.log"))?;
    let child = Command::new("delayed-queue-processor")
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true)
        .spawn()?;
    Ok(child)
}

/// Keeps exactly one `delayed-queue-processor` child alive: respawns it if
/// it ever exits, until `shutdown` fires.
async fn supervise_delayed_queue_processor(log_dir: String, shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut shutdown = shutdown;
    let mut child = match spawn_delayed_queue_processor(&log_dir) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to spawn delayed-queue-processor");
            return;
        }
    };
    tracing::info!(pid = child.id(), "spawned delayed-queue-processor singleton");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("terminating delayed-queue-processor on shutdown");
                let _ = child.start_kill();
                return;
            }
            status = child.wait() => {
                match status {
                    Ok(status) => tracing::warn!(?status, "delayed-queue-processor exited, respawning"),
                    Err(e) => tracing::error!(error = %e, "failed to wait on delayed-queue-processor"),
                }
                match spawn_delayed_queue_processor(&log_dir) {
                    Ok(c) => child = c,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to respawn delayed-queue-processor");
                        return;
                    }
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pipeline_core::config::load_dotenv();
    pipeline_core::config::init_tracing();

    let queue_config = QueueConfig::from_env();
    let queue: Arc<dyn QueueBroker> = Arc::new(RedisQueueBroker::connect(&queue_config).await?);

    let config = SupervisorConfig::from_env();
    let mut worker_supervisor = pipeline::supervisor::WorkerSupervisor::new(Arc::clone(&queue), config.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let dqp_handle = tokio::spawn(supervise_delayed_queue_processor(config.log_dir.clone(), shutdown_rx));

    let result = worker_supervisor.run_until(shutdown_signal()).await;
    let _ = shutdown_tx.send(true);
    let _ = dqp_handle.await;

    result.map_err(anyhow::Error::from)
}
