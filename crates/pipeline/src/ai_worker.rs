//! AIWorker (§4.4): drains `ai_processing`, classifies each filing (or takes
//! the negative-keyword shortcut), and hands a validated classification on
//! to `supabase_upload`. Ephemeral — processes a bounded batch then returns,
//! the way the original's AI worker script ran to completion and exited
//! rather than looping forever in-process.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pipeline_checkpoint::{CheckpointDb, CheckpointUpdate};
use pipeline_core::job::{queue_names, AiProcessingPayload, FailedPayload, Job, JobOutcome, JobPayload, SupabaseUploadPayload};
use pipeline_core::{matches_negative_keyword, Category, FinData, RawClassification, Sentiment, PROCEDURAL_SHORTCUT_SUMMARY};
use pipeline_llm::{ClassificationInput, ClassifierClient};
use pipeline_queue::QueueBroker;
use pipeline_store::StoreClient;

use crate::config::WorkerConfig;
use crate::error::PipelineError;

const PROCESSING_LIST: &str = "ai_processing:processing";
const META_HASH: &str = "ai_processing:meta";
const RETRY_HASH: &str = "ai_processing:retries";
/// Per-(corp_id, job_id) processing lock TTL (§4.4 step 3) — comfortably
/// above the slowest realistic Classifier call (5-minute hard timeout, §5).
const PROCESSING_LOCK_TTL: Duration = Duration::from_secs(600);

fn processing_lock_key(corp_id: uuid::Uuid, job_id: uuid::Uuid) -> String {
    format!("worker_processing:{corp_id}:{job_id}")
}

/// Best-effort extraction of the exchange-native identifier from a scraped
/// announcement's loosely-typed JSON — `NEWSID` (BSE) or `news_id` (already
/// normalized). Absence is non-fatal; only the checkpoint update is skipped.
fn extract_news_id(announcement: &serde_json::Value) -> Option<String> {
    announcement
        .get("news_id")
        .or_else(|| announcement.get("NEWSID"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Drains up to `config.batch_size` jobs from `ai_processing`, processing
/// each to completion before moving to the next. Returns the number handled.
pub async fn run_batch(
    queue: &Arc<dyn QueueBroker>,
    checkpoint: &CheckpointDb,
    store: &StoreClient,
    classifier: &ClassifierClient,
    config: &WorkerConfig,
    worker_id: &str,
) -> Result<u32, PipelineError> {
    let mut handled = 0;
    while handled < config.batch_size {
        let delivered = queue
            .dequeue(queue_names::AI_PROCESSING, PROCESSING_LIST, Duration::from_secs(config.dequeue_wait_secs))
            .await?;
        let Some(delivered) = delivered else { break };

        // Invalid payloads never carry a corp_id to lock on — dead-letter
        // immediately rather than skipping silently (§4.4 step 2).
        let JobPayload::AiProcessing(payload) = &delivered.job.payload else {
            handle_outcome(
                queue,
                &delivered.job,
                JobOutcome::DeadLetter { reason: "ai_processing job carried the wrong payload type".into() },
            )
            .await?;
            queue.ack(PROCESSING_LIST, &delivered).await?;
            continue;
        };

        let lock_key = processing_lock_key(payload.corp_id, delivered.job.job_id);
        if !queue.acquire_lock(&lock_key, worker_id, PROCESSING_LOCK_TTL).await? {
            // Another worker already owns this (corp_id, job_id) — assume it
            // is in flight elsewhere and skip without counting the job.
            tracing::debug!(job_id = %delivered.job.job_id, corp_id = %payload.corp_id, "processing lock held, skipping");
            queue.ack(PROCESSING_LIST, &delivered).await?;
            continue;
        }

        queue.set_processing_meta(META_HASH, &delivered.job.job_id.to_string(), Utc::now()).await?;
        queue.set_processing_payload(PROCESSING_LIST, &delivered.job.job_id.to_string(), &delivered.raw).await?;

        let outcome = process_one(&delivered.job, queue, checkpoint, store, classifier).await;
        handle_outcome(queue, &delivered.job, outcome).await?;

        queue.release_lock(&lock_key, worker_id).await?;
        queue.ack(PROCESSING_LIST, &delivered).await?;
        queue.clear_processing(META_HASH, PROCESSING_LIST, &delivered.job.job_id.to_string()).await?;
        handled += 1;
    }
    Ok(handled)
}

async fn process_one(
    job: &Job,
    queue: &Arc<dyn QueueBroker>,
    checkpoint: &CheckpointDb,
    store: &StoreClient,
    classifier: &ClassifierClient,
) -> JobOutcome {
    let JobPayload::AiProcessing(payload) = &job.payload else {
        return JobOutcome::DeadLetter { reason: "ai_processing job carried the wrong payload type".into() };
    };

    match try_classify(payload, queue, checkpoint, store, classifier).await {
        Ok(()) => JobOutcome::Success,
        Err(e) if job.retry_count + 1 >= job.max_retries => {
            JobOutcome::DeadLetter { reason: format!("exhausted retries: {e}") }
        }
        Err(e) => JobOutcome::Defer { at: Utc::now() + chrono::Duration::seconds(30), reason: e.to_string() },
    }
}

async fn try_classify(
    payload: &AiProcessingPayload,
    queue: &Arc<dyn QueueBroker>,
    checkpoint: &CheckpointDb,
    store: &StoreClient,
    classifier: &ClassifierClient,
) -> Result<(), PipelineError> {
    if store.filing_exists(payload.corp_id).await? {
        tracing::info!(corp_id = %payload.corp_id, "filing already in Store, skipping classification");
        return Ok(());
    }

    let headline = payload
        .announcement
        .get("HEADLINE")
        .or_else(|| payload.announcement.get("attchmntText"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let raw_classification = if matches_negative_keyword(&headline) {
        tracing::debug!(corp_id = %payload.corp_id, "negative-keyword shortcut, skipping Classifier call");
        procedural_shortcut(&headline)
    } else {
        classify_via_llm(payload, &headline, classifier).await?
    };

    let classification = raw_classification
        .validate()
        .map_err(|e| PipelineError::Classifier(pipeline_llm::ClassifierError::Parse(e.to_string())))?;

    if let Some(news_id) = extract_news_id(&payload.announcement) {
        checkpoint
            .update_checkpoint(
                news_id,
                CheckpointUpdate {
                    ai_processed: Some(true),
                    ai_summary: Some(classification.summary.clone()),
                    ai_processed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
    }

    let event_date = event_datetime(&payload.announcement);
    let upload = SupabaseUploadPayload {
        corp_id: payload.corp_id,
        news_id: extract_news_id(&payload.announcement).unwrap_or_default(),
        security_id: payload.security_id.clone(),
        isin: payload.announcement.get("isin").and_then(|v| v.as_str()).map(str::to_string),
        symbol: payload.announcement.get("symbol").and_then(|v| v.as_str()).map(str::to_string),
        company_name: payload.company_name.clone(),
        event_date,
        file_url: payload.pdf_url.clone(),
        original_summary: headline,
        classification,
    };
    let next_job = Job::new(JobPayload::SupabaseUpload(upload), 3, 300);
    queue.enqueue(queue_names::SUPABASE_UPLOAD, &next_job).await?;
    Ok(())
}

async fn classify_via_llm(
    payload: &AiProcessingPayload,
    headline: &str,
    classifier: &ClassifierClient,
) -> Result<RawClassification, PipelineError> {
    if let Some(pdf_url) = &payload.pdf_url {
        let bytes = reqwest::get(pdf_url).await?.error_for_status()?.bytes().await?;
        let raw = classifier.classify(ClassificationInput::Pdf { bytes: &bytes }).await?;
        return Ok(raw);
    }

    let body = payload.announcement.to_string();
    let raw = classifier.classify(ClassificationInput::Text { headline, body: &body }).await?;
    Ok(raw)
}

/// Builds the placeholder classification filed directly under
/// `Procedural/Administrative` when a headline matches a negative keyword,
/// bypassing the Classifier call entirely (§6, §9).
fn procedural_shortcut(headline: &str) -> RawClassification {
    RawClassification {
        category: Category::ProceduralAdministrative.as_str().to_string(),
        headline: headline.to_string(),
        summary: PROCEDURAL_SHORTCUT_SUMMARY.to_string(),
        findata: FinData::default(),
        individual_investor_list: Vec::new(),
        company_investor_list: Vec::new(),
        sentiment: Sentiment::Neutral,
    }
}

fn event_datetime(announcement: &serde_json::Value) -> chrono::DateTime<Utc> {
    announcement
        .get("NEWS_DT")
        .or_else(|| announcement.get("sort_date"))
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

async fn handle_outcome(queue: &Arc<dyn QueueBroker>, job: &Job, outcome: JobOutcome) -> Result<(), PipelineError> {
    match outcome {
        JobOutcome::Success => {
            queue.clear_retry(RETRY_HASH, &job.job_id.to_string()).await?;
        }
        JobOutcome::RetryImmediate { reason } => {
            tracing::warn!(job_id = %job.job_id, reason, "retrying ai_processing job immediately");
            queue.enqueue(queue_names::AI_PROCESSING, &job.retried()).await?;
        }
        JobOutcome::Defer { at, reason } => {
            tracing::warn!(job_id = %job.job_id, reason, at = %at, "deferring ai_processing job");
            queue.enqueue_delayed(queue_names::AI_PROCESSING, &job.retried(), at).await?;
        }
        JobOutcome::DeadLetter { reason } => {
            tracing::error!(job_id = %job.job_id, reason, "dead-lettering ai_processing job");
            let failed = FailedPayload {
                original_job_type: queue_names::AI_PROCESSING.to_string(),
                original_job_data: serde_json::to_value(job).unwrap_or(serde_json::Value::Null),
                error_message: reason,
                failed_at: Utc::now(),
            };
            let dead = Job::new(JobPayload::Failed(failed), 0, 60);
            queue.enqueue(queue_names::FAILED_JOBS, &dead).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_news_id_prefers_normalized_key() {
        let v = serde_json::json!({ "news_id": "N001", "NEWSID": "X" });
        assert_eq!(extract_news_id(&v).as_deref(), Some("N001"));
    }

    #[test]
    fn extract_news_id_falls_back_to_bse_key() {
        let v = serde_json::json!({ "NEWSID": "N002" });
        assert_eq!(extract_news_id(&v).as_deref(), Some("N002"));
    }

    #[test]
    fn procedural_shortcut_uses_placeholder_summary() {
        let raw = procedural_shortcut("Closure of Trading Window");
        assert_eq!(raw.summary, PROCEDURAL_SHORTCUT_SUMMARY);
        assert_eq!(raw.category, Category::ProceduralAdministrative.as_str());
    }
}
