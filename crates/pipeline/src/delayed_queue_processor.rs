//! DelayedQueueProcessor (§4.7): moves due entries from each queue's
//! `:delayed` sorted set back onto its live list. Polls at one of two
//! cadences — a rapid profile while the live queues are nearly empty (drain
//! the backlog fast while there's slack), and a normal profile once work is
//! flowing, so the sweep never competes for Redis round-trips with the
//! workers it's feeding.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pipeline_core::job::queue_names;
use pipeline_queue::QueueBroker;

use crate::config::DelayedQueueConfig;
use crate::error::PipelineError;

const WATCHED_QUEUES: &[&str] = &[
    queue_names::AI_PROCESSING,
    queue_names::SUPABASE_UPLOAD,
    queue_names::INVESTOR_PROCESSING,
];

/// One sweep across every watched queue's delayed set. Returns the total
/// number of entries restaged onto their live list.
pub async fn sweep_once(queue: &Arc<dyn QueueBroker>, config: &DelayedQueueConfig) -> Result<usize, PipelineError> {
    let mut moved = 0;
    for name in WATCHED_QUEUES {
        let now = Utc::now();
        let due = queue.due_delayed(name, now, config.batch_size).await?;
        for (i, entry) in due.iter().enumerate() {
            queue.enqueue(name, &entry.job).await?;
            queue.remove_delayed(name, &entry.raw).await?;
            moved += 1;

            // Stagger successive moves slightly so a large backlog doesn't
            // slam every worker with a burst the instant it comes due.
            if i + 1 < due.len() && config.stagger_ms > 0 {
                tokio::time::sleep(Duration::from_millis(config.stagger_ms)).await;
            }
        }
    }
    Ok(moved)
}

/// Picks the rapid or normal poll interval based on how deep the live
/// queues currently are.
pub async fn next_poll_interval(queue: &Arc<dyn QueueBroker>, config: &DelayedQueueConfig) -> Result<Duration, PipelineError> {
    let mut total_depth = 0u64;
    for name in WATCHED_QUEUES {
        total_depth += queue.queue_len(name).await?;
    }
    let interval = if total_depth <= config.rapid_profile_threshold {
        config.rapid_poll_interval_secs
    } else {
        config.normal_poll_interval_secs
    };
    Ok(Duration::from_secs(interval))
}

/// Runs the sweep forever with an adaptive delay between passes. Returns
/// only on a broker error, so the caller's main loop can log and exit —
/// it never "soft-fails" into a silent stop.
pub async fn run_forever(queue: Arc<dyn QueueBroker>, config: DelayedQueueConfig) -> Result<(), PipelineError> {
    loop {
        let moved = sweep_once(&queue, &config).await?;
        if moved > 0 {
            tracing::info!(moved, "delayed queue sweep restaged entries");
        }
        let interval = next_poll_interval(&queue, &config).await?;
        tokio::time::sleep(interval).await;
    }
}

/// A worker that crashes or is killed mid-job leaves its entry on the
/// processing list with no one left to `ack` it. The requeue sweeper finds
/// those orphans — a `meta_hash` timestamp older than `ttl` — and puts the
/// job straight back on the live queue so another worker picks it up.
pub struct RequeueSweep {
    pub queue_name: &'static str,
    pub processing_list: &'static str,
    pub meta_hash: &'static str,
}

const REQUEUE_SWEEPS: &[RequeueSweep] = &[
    RequeueSweep { queue_name: queue_names::AI_PROCESSING, processing_list: "ai_processing:processing", meta_hash: "ai_processing:meta" },
    RequeueSweep { queue_name: queue_names::SUPABASE_UPLOAD, processing_list: "supabase_upload:processing", meta_hash: "supabase_upload:meta" },
    RequeueSweep { queue_name: queue_names::INVESTOR_PROCESSING, processing_list: "investor_processing:processing", meta_hash: "investor_processing:meta" },
];

/// One pass over every watched queue's processing list, requeuing any job
/// whose `meta_hash` entry is older than `ttl`. Returns the number requeued.
pub async fn sweep_stale_processing(queue: &Arc<dyn QueueBroker>, ttl: Duration) -> Result<usize, PipelineError> {
    let mut requeued = 0;
    let now = Utc::now();
    for sweep in REQUEUE_SWEEPS {
        let stale_ids = queue.stale_processing(sweep.meta_hash, ttl, now).await?;
        for job_id in stale_ids {
            let Some(raw) = queue.get_processing_payload(sweep.processing_list, &job_id).await? else {
                // No payload left to recover — just drop the stale meta entry.
                queue.clear_processing(sweep.meta_hash, sweep.processing_list, &job_id).await?;
                continue;
            };
            let Ok(job) = serde_json::from_str::<pipeline_core::Job>(&raw) else {
                queue.clear_processing(sweep.meta_hash, sweep.processing_list, &job_id).await?;
                continue;
            };
            tracing::warn!(job_id, queue = sweep.queue_name, "requeuing orphaned in-flight job");
            queue.enqueue(sweep.queue_name, &job.retried()).await?;
            queue.clear_processing(sweep.meta_hash, sweep.processing_list, &job_id).await?;
            requeued += 1;
        }
    }
    Ok(requeued)
}

/// Runs the requeue sweep forever at a fixed cadence independent of the
/// delayed-queue sweep's adaptive polling.
pub async fn run_requeue_sweep_forever(queue: Arc<dyn QueueBroker>, ttl: Duration, poll_interval: Duration) -> Result<(), PipelineError> {
    loop {
        let requeued = sweep_stale_processing(&queue, ttl).await?;
        if requeued > 0 {
            tracing::info!(requeued, "requeue sweep recovered orphaned jobs");
        }
        tokio::time::sleep(poll_interval).await;
    }
}
