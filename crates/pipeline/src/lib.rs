pub mod ai_worker;
pub mod config;
pub mod delayed_queue_processor;
pub mod error;
pub mod investor_worker;
pub mod store_worker;
pub mod supervisor;

pub use config::{DelayedQueueConfig, SupervisedQueue, SupervisorConfig, WorkerConfig};
pub use error::PipelineError;
