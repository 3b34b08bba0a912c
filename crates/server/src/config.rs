use pipeline_core::config::{profiled_env_or, profiled_env_u16};
use serde::{Deserialize, Serialize};

/// BroadcastFrontend tuning (§4.8) — host/port to bind and the queues its
/// `/api/queue_status` endpoint reports on, mirroring the teacher's
/// `stupid_core::Config::server` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of the in-process broadcast channel feeding every connected
    /// WebSocket client (teacher's `broadcast::channel` sizing).
    pub broadcast_capacity: usize,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let p = &pipeline_core::config::active_profile();
        Self {
            host: profiled_env_or(p, "SERVER_HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "SERVER_PORT", 8080),
            broadcast_capacity: profiled_env_u16(p, "SERVER_BROADCAST_CAPACITY", 1024) as usize,
        }
    }
}
