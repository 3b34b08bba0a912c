use pipeline_core::config::{profiled_env_opt, profiled_env_or, profiled_env_u32, profiled_env_u64};
use serde::{Deserialize, Serialize};

/// Redis connection settings for the [`crate::QueueBroker`]. Mirrors the
/// original `RedisConfig`'s env vars one-for-one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub db: u32,
    pub password: Option<String>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub socket_timeout_secs: u64,
}

impl QueueConfig {
    pub fn from_env() -> Self {
        Self::from_env_profiled(&pipeline_core::config::active_profile())
    }

    pub fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "REDIS_URL"),
            host: profiled_env_or(p, "REDIS_HOST", "localhost"),
            port: profiled_env_or(p, "REDIS_PORT", "6379").parse().unwrap_or(6379),
            db: profiled_env_u32(p, "REDIS_DB", 0),
            password: profiled_env_opt(p, "REDIS_PASSWORD"),
            max_connections: profiled_env_u32(p, "REDIS_MAX_CONNECTIONS", 20),
            connect_timeout_secs: profiled_env_u64(p, "REDIS_CONNECT_TIMEOUT", 5),
            socket_timeout_secs: profiled_env_u64(p, "REDIS_SOCKET_TIMEOUT", 5),
        }
    }

    /// The connection URL `redis-rs` expects, preferring an explicit `REDIS_URL`.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match &self.password {
            Some(pw) if !pw.is_empty() => {
                format!("redis://:{}@{}:{}/{}", pw, self.host, self.port, self.db)
            }
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            host = %self.host,
            port = self.port,
            db = self.db,
            "queue config loaded"
        );
    }
}
