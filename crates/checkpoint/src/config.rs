use pipeline_core::config::{profiled_env_or, profiled_env_bool};
use serde::{Deserialize, Serialize};

/// On-disk layout for [`crate::CheckpointDb`], matching the persisted local
/// layout in this workspace's external-interface contract
/// (`./data/bse_raw.db`, `./data/<scraper>_processing.lock`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub db_path: String,
    pub lock_path: String,
    pub wal_mode: bool,
}

impl CheckpointConfig {
    pub fn from_env() -> Self {
        Self::from_env_profiled(&pipeline_core::config::active_profile())
    }

    pub fn from_env_profiled(p: &str) -> Self {
        Self {
            db_path: profiled_env_or(p, "CHECKPOINT_DB_PATH", "./data/bse_raw.db"),
            lock_path: profiled_env_or(p, "CHECKPOINT_LOCK_PATH", "./data/checkpoint.lock"),
            wal_mode: profiled_env_bool(p, "CHECKPOINT_WAL_MODE", true),
        }
    }

    /// Per-scraper variant: `./data/bse_raw.db` vs `./data/nse_raw.db`, with a
    /// matching `./data/<scraper>_processing.lock`.
    pub fn for_scraper(exchange: &str) -> Self {
        let mut cfg = Self::from_env();
        cfg.db_path = format!("./data/{}_raw.db", exchange);
        cfg.lock_path = format!("./data/{}_processing.lock", exchange);
        cfg
    }
}
