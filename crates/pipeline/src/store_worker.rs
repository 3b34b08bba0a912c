//! StoreWorker (§4.5): drains `supabase_upload`, writes each classified
//! filing to Store, and fans out to `investor_processing` when the
//! classification named any investors. Each job runs in its own child
//! process (`store-worker-child`) when process isolation is enabled,
//! mirroring the original's `multiprocessing.Process`-per-job model — one
//! wedged Postgres call can't starve the rest of the batch, and a hard
//! kill on timeout can't leave the parent's connection pool in a bad state.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pipeline_checkpoint::{CheckpointDb, CheckpointUpdate};
use pipeline_core::job::{queue_names, FailedPayload, InvestorAnalysisPayload, Job, JobOutcome, JobPayload, SupabaseUploadPayload};
use pipeline_core::StoredFiling;
use pipeline_queue::QueueBroker;
use pipeline_store::{InsertOutcome, StoreClient};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::WorkerConfig;
use crate::error::PipelineError;

const PROCESSING_LIST: &str = "supabase_upload:processing";
const META_HASH: &str = "supabase_upload:meta";
const RETRY_HASH: &str = "supabase_upload:retries";

/// Drains up to `config.batch_size` jobs from `supabase_upload`.
pub async fn run_batch(
    queue: &Arc<dyn QueueBroker>,
    checkpoint: &CheckpointDb,
    store: &StoreClient,
    config: &WorkerConfig,
    child_binary: Option<&str>,
) -> Result<u32, PipelineError> {
    let mut handled = 0;
    while handled < config.batch_size {
        let delivered = queue
            .dequeue(queue_names::SUPABASE_UPLOAD, PROCESSING_LIST, Duration::from_secs(config.dequeue_wait_secs))
            .await?;
        let Some(delivered) = delivered else { break };

        queue.set_processing_meta(META_HASH, &delivered.job.job_id.to_string(), Utc::now()).await?;
        queue.set_processing_payload(PROCESSING_LIST, &delivered.job.job_id.to_string(), &delivered.raw).await?;

        let outcome = match child_binary {
            Some(binary) => run_in_child(binary, &delivered.job, Duration::from_secs(config.job_timeout_secs)).await,
            None => process_one(&delivered.job, queue, checkpoint, store, &config.broadcast_url).await,
        };

        match outcome {
            Ok(()) => handle_success(queue, &delivered.job).await?,
            Err(e) => handle_failure(queue, &delivered.job, e).await?,
        }

        queue.ack(PROCESSING_LIST, &delivered).await?;
        queue.clear_processing(META_HASH, PROCESSING_LIST, &delivered.job.job_id.to_string()).await?;
        handled += 1;
    }
    Ok(handled)
}

/// Spawn `binary` as a detached child, feed it the job as JSON on stdin, and
/// wait up to `timeout` for it to exit 0. The child is killed (not just
/// abandoned) if the timeout elapses, via `kill_on_drop`.
async fn run_in_child(binary: &str, job: &Job, timeout: Duration) -> Result<(), PipelineError> {
    let payload = serde_json::to_vec(job)?;

    let mut child = Command::new(binary)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(&payload).await?;
    }

    let wait = tokio::time::timeout(timeout, child.wait_with_output()).await;
    match wait {
        Ok(Ok(output)) if output.status.success() => Ok(()),
        Ok(Ok(output)) => Err(PipelineError::ChildProcessFailed(format!(
            "exit {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        ))),
        Ok(Err(e)) => Err(PipelineError::Io(e)),
        Err(_) => Err(PipelineError::Timeout(timeout)),
    }
}

/// The child's own entry point — and the in-process fallback when isolation
/// is disabled. Inserts the filing, upserts findata, bumps the category
/// counter, marks the checkpoint, broadcasts, and fans out to investor
/// analysis.
pub async fn process_one(
    job: &Job,
    queue: &Arc<dyn QueueBroker>,
    checkpoint: &CheckpointDb,
    store: &StoreClient,
    broadcast_url: &str,
) -> Result<(), PipelineError> {
    let JobPayload::SupabaseUpload(payload) = &job.payload else {
        return Err(PipelineError::ChildProcessFailed("supabase_upload job carried the wrong payload type".into()));
    };

    let filing = to_stored_filing(payload);
    let outcome = store.insert_filing(&filing).await?;
    if outcome == InsertOutcome::AlreadyExists {
        tracing::info!(corp_id = %payload.corp_id, "filing already present, skipping downstream side effects");
        return Ok(());
    }

    if let Some(isin) = &payload.isin {
        if !payload.classification.findata.is_empty() {
            store.upsert_findata(payload.corp_id, isin, &payload.classification).await?;
        }
    }

    store.increment_category_count(payload.event_date.date_naive(), payload.classification.category).await?;

    if !payload.news_id.is_empty() {
        checkpoint
            .update_checkpoint(
                payload.news_id.clone(),
                CheckpointUpdate { sent_to_supabase: Some(true), sent_to_supabase_at: Some(Utc::now()), ..Default::default() },
            )
            .await?;
    }

    post_to_broadcast_frontend(broadcast_url, &filing).await;

    let has_investors = !payload.classification.individual_investor_list.is_empty()
        || !payload.classification.company_investor_list.is_empty();
    if has_investors {
        let investor_job = Job::new(
            JobPayload::InvestorAnalysis(InvestorAnalysisPayload {
                corp_id: payload.corp_id,
                category: payload.classification.category.as_str().to_string(),
                individual_investors: payload.classification.individual_investor_list.clone(),
                company_investors: payload.classification.company_investor_list.clone(),
            }),
            3,
            120,
        );
        queue.enqueue(queue_names::INVESTOR_PROCESSING, &investor_job).await?;
    }

    Ok(())
}

/// Posts the accepted filing to the BroadcastFrontend's intake endpoint
/// (§4.5 point 5e). The `server` crate applies the §4.8 filter and decides
/// whether to push it to the `"all"` room; a failed or unreachable
/// BroadcastFrontend never fails the job, since the filing is already
/// durably written to Store and LocalCheckpointDB.
async fn post_to_broadcast_frontend(broadcast_url: &str, filing: &StoredFiling) {
    let client = reqwest::Client::new();
    match client.post(broadcast_url).json(filing).send().await {
        Ok(resp) if resp.status().is_success() => {}
        Ok(resp) => tracing::warn!(status = %resp.status(), corp_id = %filing.corp_id, "BroadcastFrontend intake rejected filing"),
        Err(e) => tracing::warn!(error = %e, corp_id = %filing.corp_id, "failed to reach BroadcastFrontend"),
    }
}

fn to_stored_filing(payload: &SupabaseUploadPayload) -> StoredFiling {
    StoredFiling {
        corp_id: payload.corp_id,
        news_id: payload.news_id.clone(),
        security_id: payload.security_id.clone(),
        isin: payload.isin.clone(),
        symbol: payload.symbol.clone(),
        company_name: payload.company_name.clone(),
        category: payload.classification.category,
        headline: payload.classification.headline.clone(),
        ai_summary: payload.classification.summary.clone(),
        original_summary: payload.original_summary.clone(),
        sentiment: payload.classification.sentiment,
        event_date: payload.event_date,
        file_url: payload.file_url.clone(),
    }
}

async fn handle_success(queue: &Arc<dyn QueueBroker>, job: &Job) -> Result<(), PipelineError> {
    queue.clear_retry(RETRY_HASH, &job.job_id.to_string()).await?;
    Ok(())
}

async fn handle_failure(queue: &Arc<dyn QueueBroker>, job: &Job, error: PipelineError) -> Result<(), PipelineError> {
    let outcome = if job.retry_count + 1 >= job.max_retries {
        JobOutcome::DeadLetter { reason: error.to_string() }
    } else {
        JobOutcome::Defer { at: Utc::now() + chrono::Duration::seconds(30), reason: error.to_string() }
    };

    match outcome {
        JobOutcome::Defer { at, reason } => {
            tracing::warn!(job_id = %job.job_id, reason, "deferring supabase_upload job");
            queue.enqueue_delayed(queue_names::SUPABASE_UPLOAD, &job.retried(), at).await?;
        }
        JobOutcome::DeadLetter { reason } => {
            tracing::error!(job_id = %job.job_id, reason, "dead-lettering supabase_upload job");
            let failed = FailedPayload {
                original_job_type: queue_names::SUPABASE_UPLOAD.to_string(),
                original_job_data: serde_json::to_value(job).unwrap_or(serde_json::Value::Null),
                error_message: reason,
                failed_at: Utc::now(),
            };
            let dead = Job::new(JobPayload::Failed(failed), 0, 60);
            queue.enqueue(queue_names::FAILED_JOBS, &dead).await?;
        }
        JobOutcome::Success | JobOutcome::RetryImmediate { .. } => unreachable!(),
    }
    Ok(())
}
