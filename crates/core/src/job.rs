use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::announcement::Classification;

/// Mirrors `JobPriority` from the original queue's job-type module. Carried on
/// every job envelope but not currently used to reorder a FIFO list — reserved
/// for a future priority queue without forcing a wire-format change today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Payload carried by an `ai_processing` job: enough of the raw announcement
/// for AIWorker to fetch a PDF (if any) and call the Classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProcessingPayload {
    pub corp_id: Uuid,
    /// Raw announcement fields as scraped, kept loosely typed the way the
    /// original job envelope carries an untyped dict — downstream consumers
    /// only ever read specific keys out of it.
    pub announcement: Value,
    pub pdf_url: Option<String>,
    pub company_name: String,
    pub security_id: String,
}

/// Payload carried by a `supabase_upload` job: the validated classification
/// plus enough identifiers for StoreWorker to build a `StoredFiling`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseUploadPayload {
    pub corp_id: Uuid,
    pub news_id: String,
    pub security_id: String,
    pub isin: Option<String>,
    pub symbol: Option<String>,
    pub company_name: String,
    pub event_date: DateTime<Utc>,
    pub file_url: Option<String>,
    pub original_summary: String,
    pub classification: Classification,
}

/// Payload carried by an `investor_processing` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestorAnalysisPayload {
    pub corp_id: Uuid,
    pub category: String,
    pub individual_investors: Vec<String>,
    pub company_investors: Vec<String>,
}

/// Payload carried by a `failed_jobs` (dead-letter) entry: the job type and
/// body that could not be recovered, plus why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPayload {
    pub original_job_type: String,
    pub original_job_data: Value,
    pub error_message: String,
    pub failed_at: DateTime<Utc>,
}

/// The union of everything a [`Job`] envelope can carry. Replaces the
/// original's per-type subclassing of a common base job — one generic
/// envelope, one enum of payload shapes, matched exhaustively at each
/// queue's single consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "job_type", content = "payload", rename_all = "snake_case")]
pub enum JobPayload {
    AiProcessing(AiProcessingPayload),
    SupabaseUpload(SupabaseUploadPayload),
    InvestorAnalysis(InvestorAnalysisPayload),
    Failed(FailedPayload),
}

impl JobPayload {
    /// The queue base name this payload belongs on (without `:delayed` suffix).
    pub fn queue_name(&self) -> &'static str {
        match self {
            JobPayload::AiProcessing(_) => queue_names::AI_PROCESSING,
            JobPayload::SupabaseUpload(_) => queue_names::SUPABASE_UPLOAD,
            JobPayload::InvestorAnalysis(_) => queue_names::INVESTOR_PROCESSING,
            JobPayload::Failed(_) => queue_names::FAILED_JOBS,
        }
    }
}

/// A serializable unit of work. Common envelope fields live here once instead
/// of being duplicated per job subtype; `payload` carries the type-specific
/// shape via [`JobPayload`]. `job_id` is unique per job instance; `corp_id`
/// (reachable through `payload`) is the correlation key across related jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub payload: JobPayload,
}

impl Job {
    pub fn new(payload: JobPayload, max_retries: u32, timeout_seconds: u64) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            created_at: Utc::now(),
            priority: Priority::default(),
            retry_count: 0,
            max_retries,
            timeout_seconds,
            metadata: HashMap::new(),
            payload,
        }
    }

    pub fn queue_name(&self) -> &'static str {
        self.payload.queue_name()
    }

    /// A new job instance with `retry_count` incremented, ready for requeue.
    /// Mirrors the original's "create a new job for retry instead of mutating
    /// the existing one" note (sidesteps model-validation churn there; here
    /// it keeps `Job` plain data with no interior mutability).
    pub fn retried(&self) -> Self {
        let mut next = self.clone();
        next.retry_count += 1;
        next
    }
}

/// The outcome of handling one job, returned by every worker's per-job
/// handler. Replaces exception-for-control-flow: a handler never raises past
/// its own ingress point, it returns one of these.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Success,
    /// Retry immediately, in-process (still within session/retry bounds).
    RetryImmediate { reason: String },
    /// Defer to the paired `:delayed` sorted set, eligible at `at`.
    Defer { at: DateTime<Utc>, reason: String },
    /// Permanently unrecoverable; move to `failed_jobs`.
    DeadLetter { reason: String },
}

/// Well-known queue name constants, matching the broker's literal strings.
pub mod queue_names {
    pub const NAMESPACE: &str = "backfin:queue:";

    pub const NEW_ANNOUNCEMENTS: &str = "new_announcements";
    pub const AI_PROCESSING: &str = "ai_processing";
    pub const SUPABASE_UPLOAD: &str = "supabase_upload";
    pub const INVESTOR_PROCESSING: &str = "investor_processing";
    pub const FAILED_JOBS: &str = "failed_jobs";
    pub const HIGH_PRIORITY: &str = "high_priority";
    pub const RETRY: &str = "retry";

    /// Full namespaced key for a queue, e.g. `backfin:queue:ai_processing`.
    pub fn full(name: &str) -> String {
        format!("{}{}", NAMESPACE, name)
    }

    /// Full namespaced key for a queue's paired delayed sorted set.
    pub fn delayed(name: &str) -> String {
        format!("{}{}:delayed", NAMESPACE, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retried_job_increments_retry_count_without_mutating_original() {
        let job = Job::new(
            JobPayload::InvestorAnalysis(InvestorAnalysisPayload {
                corp_id: Uuid::nil(),
                category: "Financial Results".to_string(),
                individual_investors: vec![],
                company_investors: vec![],
            }),
            3,
            300,
        );
        let next = job.retried();
        assert_eq!(job.retry_count, 0);
        assert_eq!(next.retry_count, 1);
        assert_eq!(job.job_id, next.job_id);
    }

    #[test]
    fn queue_name_maps_to_the_right_well_known_string() {
        let job = Job::new(
            JobPayload::AiProcessing(AiProcessingPayload {
                corp_id: Uuid::nil(),
                announcement: Value::Null,
                pdf_url: None,
                company_name: String::new(),
                security_id: String::new(),
            }),
            3,
            300,
        );
        assert_eq!(job.queue_name(), queue_names::AI_PROCESSING);
        assert_eq!(
            queue_names::full(job.queue_name()),
            "backfin:queue:ai_processing"
        );
        assert_eq!(
            queue_names::delayed(job.queue_name()),
            "backfin:queue:ai_processing:delayed"
        );
    }
}
