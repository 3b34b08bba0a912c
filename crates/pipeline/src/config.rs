use pipeline_core::config::{profiled_env_bool, profiled_env_or, profiled_env_u32, profiled_env_u64};
use serde::{Deserialize, Serialize};

/// Shared tuning knobs for the ephemeral workers (AIWorker/StoreWorker/
/// InvestorWorker) — how many jobs to drain per run and how long to wait
/// for the next one before exiting (§4.4-§4.6, "ephemeral batch consumer").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub batch_size: u32,
    pub dequeue_wait_secs: u64,
    pub job_timeout_secs: u64,
    pub requeue_sweep_ttl_secs: u64,
    /// Base for AIWorker's exponential-backoff delayed re-queue (§4.4):
    /// `backoff(n) = min(base * 2^(n/3), 3600)`.
    pub backoff_base_secs: u64,
    /// StoreWorker only: the BroadcastFrontend's intake endpoint it POSTs
    /// accepted filings to (§4.5 point 5e, §4.8).
    pub broadcast_url: String,
}

/// `backoff(n) = min(base * 2^(n/3), 3600)` (§4.4) — `n` is the job's total
/// retry count so far, so the delay grows every three retries rather than
/// every one.
pub fn backoff_secs(base: u64, n: u32) -> u64 {
    let scaled = base as f64 * 2f64.powf(n as f64 / 3.0);
    (scaled.min(3600.0)) as u64
}

impl WorkerConfig {
    pub fn from_env(prefix: &str) -> Self {
        let p = &pipeline_core::config::active_profile();
        Self {
            batch_size: profiled_env_u32(p, &format!("{prefix}_BATCH_SIZE"), 10),
            dequeue_wait_secs: profiled_env_u64(p, &format!("{prefix}_DEQUEUE_WAIT_SECS"), 5),
            job_timeout_secs: profiled_env_u64(p, &format!("{prefix}_JOB_TIMEOUT_SECS"), 300),
            requeue_sweep_ttl_secs: profiled_env_u64(p, &format!("{prefix}_REQUEUE_SWEEP_TTL_SECS"), 600),
            backoff_base_secs: profiled_env_u64(p, &format!("{prefix}_BACKOFF_BASE_SECS"), 30),
            broadcast_url: profiled_env_or(p, "BROADCAST_URL", "http://127.0.0.1:8080/insert_new_announcement"),
        }
    }
}

/// Tuning for [`crate::delayed_queue_processor`] — how aggressively it moves
/// due entries from a `:delayed` sorted set back onto the live queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayedQueueConfig {
    pub rapid_poll_interval_secs: u64,
    pub normal_poll_interval_secs: u64,
    /// Live-queue depth at or below which the processor switches to the
    /// rapid polling profile (draining the backlog quickly while the system
    /// is otherwise idle).
    pub rapid_profile_threshold: u64,
    pub batch_size: usize,
    pub stagger_ms: u64,
}

impl DelayedQueueConfig {
    pub fn from_env() -> Self {
        let p = &pipeline_core::config::active_profile();
        Self {
            rapid_poll_interval_secs: profiled_env_u64(p, "DELAYED_QUEUE_RAPID_POLL_SECS", 1),
            normal_poll_interval_secs: profiled_env_u64(p, "DELAYED_QUEUE_NORMAL_POLL_SECS", 10),
            rapid_profile_threshold: profiled_env_u64(p, "DELAYED_QUEUE_RAPID_THRESHOLD", 5),
            batch_size: profiled_env_u32(p, "DELAYED_QUEUE_BATCH_SIZE", 50) as usize,
            stagger_ms: profiled_env_u64(p, "DELAYED_QUEUE_STAGGER_MS", 50),
        }
    }
}

/// Per-queue supervisor settings — how many worker processes may run
/// concurrently against one queue, how long a spawn is given before being
/// considered hung, and the cool-down between successive spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisedQueue {
    pub name: String,
    pub binary: String,
    pub max_concurrent: u32,
    pub max_runtime_secs: u64,
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub log_dir: String,
    pub queues: Vec<SupervisedQueue>,
}

impl SupervisorConfig {
    /// Mirrors the original `worker_spawner`'s static per-queue table: one
    /// entry per ephemeral worker binary, matched to the queue it drains.
    pub fn from_env() -> Self {
        let p = &pipeline_core::config::active_profile();
        let log_dir = profiled_env_or(p, "SUPERVISOR_LOG_DIR", "./logs");

        let entry = |name: &str, binary: &str, default_concurrent: u32| SupervisedQueue {
            name: name.to_string(),
            binary: binary.to_string(),
            max_concurrent: profiled_env_u32(
                p,
                &format!("SUPERVISOR_{}_MAX_CONCURRENT", name.to_uppercase()),
                default_concurrent,
            ),
            max_runtime_secs: profiled_env_u64(
                p,
                &format!("SUPERVISOR_{}_MAX_RUNTIME_SECS", name.to_uppercase()),
                600,
            ),
            cooldown_secs: profiled_env_u64(
                p,
                &format!("SUPERVISOR_{}_COOLDOWN_SECS", name.to_uppercase()),
                5,
            ),
        };

        Self {
            log_dir,
            queues: vec![
                entry(pipeline_core::job::queue_names::AI_PROCESSING, "ai-worker", 2),
                entry(pipeline_core::job::queue_names::SUPABASE_UPLOAD, "store-worker", 1),
                entry(pipeline_core::job::queue_names::INVESTOR_PROCESSING, "investor-worker", 1),
            ],
        }
    }
}

/// Toggles per-job process isolation for StoreWorker (mirrors the original's
/// `multiprocessing.Process`-per-job model) vs running in-process — useful
/// for local development where spawning a child binary per job is overkill.
pub fn store_worker_process_isolation_enabled() -> bool {
    profiled_env_bool(&pipeline_core::config::active_profile(), "STORE_WORKER_PROCESS_ISOLATION", true)
}
