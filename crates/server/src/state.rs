use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pipeline_queue::QueueBroker;
use tokio::sync::broadcast;

use crate::config::ServerConfig;

/// The fixed (and only) push-channel room the spec allows clients to join
/// (§4.8, §6 "Push channel only accepts joining the fixed room `all`").
pub const ROOM_ALL: &str = "all";

/// Lock-free counters surfaced at `/api/queue_status` — mirrors the
/// teacher's `QueueMetrics` (atomics read under `Ordering::Relaxed` since
/// these are dashboard-grade counters, not a correctness boundary).
pub struct IntakeMetrics {
    pub received: AtomicU64,
    pub accepted: AtomicU64,
    pub skipped: AtomicU64,
    pub rejected: AtomicU64,
}

impl IntakeMetrics {
    pub fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }
}

pub struct AppState {
    pub config: ServerConfig,
    /// Fanned out to every connected WebSocket client in room `"all"`.
    pub broadcast: broadcast::Sender<String>,
    /// Used only for `/api/queue_status`'s depth/health reporting — the
    /// BroadcastFrontend never dequeues jobs itself.
    pub queue: Arc<dyn QueueBroker>,
    pub metrics: IntakeMetrics,
    /// Count of sockets currently subscribed to room `"all"`.
    pub socket_count: AtomicU64,
}

impl AppState {
    pub fn new(config: ServerConfig, queue: Arc<dyn QueueBroker>) -> Arc<Self> {
        let (broadcast, _rx) = broadcast::channel(config.broadcast_capacity);
        Arc::new(Self { config, broadcast, queue, metrics: IntakeMetrics::new(), socket_count: AtomicU64::new(0) })
    }

    pub fn socket_count(&self) -> u64 {
        self.socket_count.load(Ordering::Relaxed)
    }
}
