//! investor-worker — ephemeral batch consumer for `investor_processing` (§4.6).

use std::sync::Arc;

use clap::Parser;
use pipeline_queue::{QueueBroker, QueueConfig, RedisQueueBroker};
use pipeline_store::{StoreClient, StoreConfig};

/// Ephemeral investor-resolution worker.
#[derive(Parser, Debug)]
#[command(name = "investor-worker", version, about)]
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

    let config = pipeline::WorkerConfig::from_env("INVESTOR_WORKER");

    let queue_config = QueueConfig::from_env();
    let queue: Arc<dyn QueueBroker> = Arc::new(RedisQueueBroker::connect(&queue_config).await?);

    let store_config = StoreConfig::from_env();
    let store = StoreClient::connect(&store_config).await?;

    let handled = pipeline::investor_worker::run_batch(&queue, &store, &config).await?;
    tracing::info!(handled, "investor-worker batch complete");
    Ok(())
}
