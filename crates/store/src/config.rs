use pipeline_core::config::{profiled_env_opt, profiled_env_u32};
use serde::{Deserialize, Serialize};

/// Connection settings for the Store (Postgres — the natural analogue of
/// the spec's externally hosted "Supabase" database).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self::from_env_profiled(&pipeline_core::config::active_profile())
    }

    pub fn from_env_profiled(p: &str) -> Self {
        Self {
            database_url: profiled_env_opt(p, "SUPABASE_DB_URL")
                .or_else(|| profiled_env_opt(p, "DATABASE_URL")),
            max_connections: profiled_env_u32(p, "STORE_MAX_CONNECTIONS", 10),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            configured = self.database_url.is_some(),
            max_connections = self.max_connections,
            "store config loaded"
        );
    }
}
