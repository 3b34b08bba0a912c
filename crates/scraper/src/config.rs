use pipeline_core::config::{profiled_env_or, profiled_env_u32, profiled_env_u64};
use serde::{Deserialize, Serialize};

/// Per-exchange scraper settings — polling cadence, cursor/lock file paths,
/// and request tuning. One `ScraperConfig` per binary (`scraper-bse`,
/// `scraper-nse`), selected via [`ScraperConfig::for_exchange`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub exchange: String,
    pub cursor_path: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub max_fetch_retries: u32,
    pub queued_marker_ttl_secs: u64,
    pub ai_job_max_retries: u32,
    pub ai_job_timeout_secs: u64,
}

impl ScraperConfig {
    pub fn for_exchange(exchange: &str) -> Self {
        let p = &pipeline_core::config::active_profile();
        Self {
            exchange: exchange.to_string(),
            cursor_path: profiled_env_or(
                p,
                &format!("{}_CURSOR_PATH", exchange.to_uppercase()),
                &format!("./data/latest_announcement_{exchange}.json"),
            ),
            poll_interval_secs: profiled_env_u64(p, "SCRAPER_POLL_INTERVAL_SECS", 10),
            request_timeout_secs: profiled_env_u64(p, "SCRAPER_REQUEST_TIMEOUT_SECS", 30),
            max_fetch_retries: profiled_env_u32(p, "SCRAPER_MAX_FETCH_RETRIES", 50),
            queued_marker_ttl_secs: profiled_env_u64(p, "SCRAPER_QUEUED_MARKER_TTL_SECS", 86_400),
            ai_job_max_retries: profiled_env_u32(p, "SCRAPER_AI_JOB_MAX_RETRIES", 3),
            ai_job_timeout_secs: profiled_env_u64(p, "SCRAPER_AI_JOB_TIMEOUT_SECS", 300),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            exchange = %self.exchange,
            cursor_path = %self.cursor_path,
            poll_interval_secs = self.poll_interval_secs,
            "scraper config loaded"
        );
    }
}
