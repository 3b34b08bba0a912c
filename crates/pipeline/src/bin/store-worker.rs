//! store-worker — ephemeral batch consumer for `supabase_upload` (§4.5).
//! Each job is optionally isolated in a `store-worker-child` subprocess so a
//! wedged Postgres call can't starve the rest of the batch; the requeue
//! sweeper that recovers crashed in-flight jobs runs in the supervisor/
//! delayed-queue-processor binary, not here, since it only ever touches the
//! broker.

use std::sync::Arc;

use clap::Parser;
use pipeline_checkpoint::{CheckpointConfig, CheckpointDb};
use pipeline_queue::{QueueBroker, QueueConfig, RedisQueueBroker};
use pipeline_store::{StoreClient, StoreConfig};

/// Ephemeral Store-upload worker.
#[derive(Parser, Debug)]
#[command(name = "store-worker", version, about)]
struct Cli {
    /// Drain one batch then exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pipeline_core::config::load_dotenv();
    pipeline_core::config::init_tracing();
    let _cli = Cli::parse();

    let config = pipeline::WorkerConfig::from_env("STORE_WORKER");

    let checkpoint_config = CheckpointConfig::from_env();
    let checkpoint = CheckpointDb::open(&checkpoint_config.db_path, checkpoint_config.wal_mode).await?;

    let queue_config = QueueConfig::from_env();
    let queue: Arc<dyn QueueBroker> = Arc::new(RedisQueueBroker::connect(&queue_config).await?);

    let store_config = StoreConfig::from_env();
    let store = StoreClient::connect(&store_config).await?;

    let child_binary = if pipeline::store_worker_process_isolation_enabled() {
        Some("store-worker-child")
    } else {
        None
    };

    let handled = pipeline::store_worker::run_batch(&queue, &checkpoint, &store, &config, child_binary).await?;
    tracing::info!(handled, "store-worker batch complete");
    Ok(())
}
