//! store-worker-child — the per-job subprocess `store-worker` spawns when
//! process isolation is enabled (§4.5, §9 "subprocess-per-job"). Reads one
//! serialized [`pipeline_core::Job`] from stdin, re-creates its own Store
//! and queue clients (never inherits the parent's), and does the actual
//! insert/upsert/broadcast/fan-out work. Exit code is the parent's only
//! signal: 0 success, non-zero failure.

use std::io::Read;
use std::sync::Arc;

use pipeline_checkpoint::{CheckpointConfig, CheckpointDb};
use pipeline_core::Job;
use pipeline_queue::{QueueBroker, QueueConfig, RedisQueueBroker};
use pipeline_store::{StoreClient, StoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pipeline_core::config::load_dotenv();
    pipeline_core::config::init_tracing();

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let job: Job = serde_json::from_str(&input)?;

    let checkpoint_config = CheckpointConfig::from_env();
    let checkpoint = CheckpointDb::open(&checkpoint_config.db_path, checkpoint_config.wal_mode).await?;

    let queue_config = QueueConfig::from_env();
    let queue: Arc<dyn QueueBroker> = Arc::new(RedisQueueBroker::connect(&queue_config).await?);

    let store_config = StoreConfig::from_env();
    let store = StoreClient::connect(&store_config).await?;

    let worker_config = pipeline::WorkerConfig::from_env("STORE_WORKER");

    match pipeline::store_worker::process_one(&job, &queue, &checkpoint, &store, &worker_config.broadcast_url).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(job_id = %job.job_id, error = %e, "store-worker-child failed");
            std::process::exit(1);
        }
    }
}
