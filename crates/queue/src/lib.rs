pub mod broker;
pub mod config;
pub mod error;

pub use broker::{Delivered, DelayedEntry, QueueBroker, QueueHealth, RedisQueueBroker};
pub use config::QueueConfig;
pub use error::QueueError;
