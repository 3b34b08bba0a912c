//! InvestorWorker (§4.6): drains `investor_processing`, resolving each named
//! investor against `smart_investors`/`investor_aliases` and falling back to
//! an unverified record when no match exists, then links every resolved
//! investor to the filing. Dispatch here is queued rather than inline —
//! StoreWorker only ever enqueues, never calls this resolution logic
//! directly — so a slow investor lookup can't hold up the filing insert
//! that triggered it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pipeline_core::job::{queue_names, FailedPayload, Job, JobPayload};
use pipeline_queue::QueueBroker;
use pipeline_store::{InvestorLink, StoreClient};

use crate::config::WorkerConfig;
use crate::error::PipelineError;

const PROCESSING_LIST: &str = "investor_processing:processing";
const META_HASH: &str = "investor_processing:meta";
const RETRY_HASH: &str = "investor_processing:retries";

pub async fn run_batch(
    queue: &Arc<dyn QueueBroker>,
    store: &StoreClient,
    config: &WorkerConfig,
) -> Result<u32, PipelineError> {
    let mut handled = 0;
    while handled < config.batch_size {
        let delivered = queue
            .dequeue(queue_names::INVESTOR_PROCESSING, PROCESSING_LIST, Duration::from_secs(config.dequeue_wait_secs))
            .await?;
        let Some(delivered) = delivered else { break };

        queue.set_processing_meta(META_HASH, &delivered.job.job_id.to_string(), Utc::now()).await?;
        queue.set_processing_payload(PROCESSING_LIST, &delivered.job.job_id.to_string(), &delivered.raw).await?;

        match process_one(&delivered.job, store).await {
            Ok(()) => {
                queue.clear_retry(RETRY_HASH, &delivered.job.job_id.to_string()).await?;
            }
            Err(e) if delivered.job.retry_count + 1 >= delivered.job.max_retries => {
                dead_letter(queue, &delivered.job, e.to_string()).await?;
            }
            Err(e) => {
                tracing::warn!(job_id = %delivered.job.job_id, error = %e, "deferring investor_processing job");
                let at = Utc::now() + chrono::Duration::seconds(30);
                queue.enqueue_delayed(queue_names::INVESTOR_PROCESSING, &delivered.job.retried(), at).await?;
            }
        }

        queue.ack(PROCESSING_LIST, &delivered).await?;
        queue.clear_processing(META_HASH, PROCESSING_LIST, &delivered.job.job_id.to_string()).await?;
        handled += 1;
    }
    Ok(handled)
}

async fn process_one(job: &Job, store: &StoreClient) -> Result<(), PipelineError> {
    let JobPayload::InvestorAnalysis(payload) = &job.payload else {
        return Err(PipelineError::ChildProcessFailed("investor_processing job carried the wrong payload type".into()));
    };

    let mut links = Vec::new();
    for name in payload.individual_investors.iter().chain(payload.company_investors.iter()) {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let (investor_id, verified) = match store.resolve_investor(name).await? {
            Some(id) => (id, true),
            None => (store.create_unverified_investor(name).await?, false),
        };
        links.push(InvestorLink { corp_id: payload.corp_id, investor_id, investor_name: name.to_string(), verified });
    }

    if !links.is_empty() {
        store.insert_investor_links(&links).await?;
    }
    Ok(())
}

async fn dead_letter(queue: &Arc<dyn QueueBroker>, job: &Job, reason: String) -> Result<(), PipelineError> {
    tracing::error!(job_id = %job.job_id, reason, "dead-lettering investor_processing job");
    let failed = FailedPayload {
        original_job_type: queue_names::INVESTOR_PROCESSING.to_string(),
        original_job_data: serde_json::to_value(job).unwrap_or(serde_json::Value::Null),
        error_message: reason,
        failed_at: Utc::now(),
    };
    let dead = Job::new(JobPayload::Failed(failed), 0, 60);
    queue.enqueue(queue_names::FAILED_JOBS, &dead).await?;
    Ok(())
}
