//! ai-worker — ephemeral batch consumer for `ai_processing` (§4.4). Drains
//! up to `AI_WORKER_BATCH_SIZE` jobs then exits; the supervisor respawns it
//! as the queue refills.

use std::sync::Arc;

use clap::Parser;
use pipeline_checkpoint::{CheckpointConfig, CheckpointDb};
use pipeline_llm::{ClassifierClient, ClassifierConfig};
use pipeline_queue::{QueueBroker, QueueConfig, RedisQueueBroker};
use pipeline_store::{StoreClient, StoreConfig};

/// Ephemeral AI classification worker.
#[derive(Parser, Debug)]
#[command(name = "ai-worker", version, about)]
struct Cli {
    /// Drain one batch then exit (always true in practice — kept for
    /// symmetry with the scraper binaries and the supervisor's spawn args).
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pipeline_core::config::load_dotenv();
    pipeline_core::config::init_tracing();
    let _cli = Cli::parse();

    let config = pipeline::WorkerConfig::from_env("AI_WORKER");

    let checkpoint_config = CheckpointConfig::from_env();
    let checkpoint = CheckpointDb::open(&checkpoint_config.db_path, checkpoint_config.wal_mode).await?;

    let queue_config = QueueConfig::from_env();
    let queue: Arc<dyn QueueBroker> = Arc::new(RedisQueueBroker::connect(&queue_config).await?);

    let store_config = StoreConfig::from_env();
    let store = StoreClient::connect(&store_config).await?;

    let classifier_config = ClassifierConfig::from_env();
    classifier_config.log_summary();
    let classifier = ClassifierClient::new(classifier_config);

    let worker_id = format!("ai-worker:{}", uuid::Uuid::new_v4());
    let handled = pipeline::ai_worker::run_batch(&queue, &checkpoint, &store, &classifier, &config, &worker_id).await?;
    tracing::info!(handled, worker_id, "ai-worker batch complete");
    Ok(())
}
