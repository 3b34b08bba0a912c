use pipeline_core::config::{profiled_env_bool, profiled_env_opt, profiled_env_u32, profiled_env_u64};
use serde::{Deserialize, Serialize};

/// Janitor timings, one-for-one with `queue_manager.py`'s env vars
/// (`QUEUE_*`), renamed under a `VERIFICATION_` prefix to match this
/// workspace's per-crate config naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub enabled: bool,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub cleanup_interval_secs: u64,
    pub task_timeout_secs: u64,
    pub session_timeout_secs: u64,
    pub max_retry_count: u32,
    /// Cap on how many queued tasks get a "new task" notification per cycle
    /// (`queued_tasks[:10]` in the source).
    pub notify_batch: usize,
}

impl VerificationConfig {
    pub fn from_env() -> Self {
        Self::from_env_profiled(&pipeline_core::config::active_profile())
    }

    pub fn from_env_profiled(p: &str) -> Self {
        Self {
            enabled: profiled_env_bool(p, "VERIFICATION_QUEUE_MANAGEMENT_ENABLED", true),
            database_url: profiled_env_opt(p, "SUPABASE_DB_URL").or_else(|| profiled_env_opt(p, "DATABASE_URL")),
            max_connections: profiled_env_u32(p, "VERIFICATION_STORE_MAX_CONNECTIONS", 5),
            cleanup_interval_secs: profiled_env_u64(p, "VERIFICATION_QUEUE_CLEANUP_INTERVAL", 60),
            task_timeout_secs: profiled_env_u64(p, "VERIFICATION_QUEUE_TASK_TIMEOUT", 1800),
            session_timeout_secs: profiled_env_u64(p, "VERIFICATION_QUEUE_SESSION_TIMEOUT", 3600),
            max_retry_count: profiled_env_u32(p, "VERIFICATION_QUEUE_MAX_RETRIES", 3),
            notify_batch: profiled_env_u32(p, "VERIFICATION_NOTIFY_BATCH", 10) as usize,
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            enabled = self.enabled,
            cleanup_interval_secs = self.cleanup_interval_secs,
            task_timeout_secs = self.task_timeout_secs,
            session_timeout_secs = self.session_timeout_secs,
            max_retry_count = self.max_retry_count,
            "verification janitor config loaded"
        );
    }
}
