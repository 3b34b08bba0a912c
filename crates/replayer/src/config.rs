use pipeline_core::config::{profiled_env_or, profiled_env_u32, profiled_env_u64};
use serde::{Deserialize, Serialize};

/// Settings for the Replayer's reconciliation pass (§4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayerConfig {
    /// Rows pulled per pass (`--batch`, Python default 200).
    pub batch_size: u32,
    /// Classifier/Store call attempts per row before moving on.
    pub max_retries: u32,
    /// Continuous-mode base poll interval in seconds (`--interval`).
    pub interval_secs: u64,
    /// Consecutive empty passes before the continuous loop starts backing off.
    pub idle_backoff_threshold: u32,
    /// Ceiling the backed-off interval never exceeds.
    pub idle_backoff_max_secs: u64,
    /// Where downloaded PDFs are kept so a later pass doesn't re-fetch one.
    pub pdf_dir: String,
}

impl ReplayerConfig {
    pub fn from_env() -> Self {
        let p = &pipeline_core::config::active_profile();
        Self {
            batch_size: profiled_env_u32(p, "REPLAYER_BATCH_SIZE", 200),
            max_retries: profiled_env_u32(p, "REPLAYER_MAX_RETRIES", 3),
            interval_secs: profiled_env_u64(p, "REPLAYER_INTERVAL_SECS", 60),
            idle_backoff_threshold: profiled_env_u32(p, "REPLAYER_IDLE_BACKOFF_THRESHOLD", 10),
            idle_backoff_max_secs: profiled_env_u64(p, "REPLAYER_IDLE_BACKOFF_MAX_SECS", 300),
            pdf_dir: profiled_env_or(p, "REPLAYER_PDF_DIR", "./data/replayer_pdfs"),
        }
    }
}
