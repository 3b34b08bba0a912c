//! Continuous mode (§4.11): wake every `interval` seconds, target today,
//! back off when idle. Mirrors `replay_processor.py`'s `run_continuous_replay`
//! — double the wait after `idle_backoff_threshold` consecutive empty
//! passes, capped at `idle_backoff_max_secs`, reset to the base interval the
//! moment a pass finds work again.

use chrono::Utc;
use pipeline_checkpoint::CheckpointDb;
use pipeline_llm::ClassifierClient;
use pipeline_store::StoreClient;

use crate::config::ReplayerConfig;
use crate::error::ReplayerError;

/// Runs passes forever until `shutdown` resolves, targeting the current
/// date on every pass (an outage recovered mid-day is caught the same run).
pub async fn run_continuous(
    config: &ReplayerConfig,
    checkpoint: &CheckpointDb,
    store: &StoreClient,
    classifier: &ClassifierClient,
    skip_llm: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), ReplayerError> {
    tokio::pin!(shutdown);
    let mut interval = config.interval_secs;
    let mut consecutive_empty = 0u32;

    loop {
        let today = Utc::now().date_naive();
        match crate::run_once(today, config, checkpoint, store, classifier, skip_llm).await {
            Ok(0) => {
                consecutive_empty += 1;
                if consecutive_empty >= config.idle_backoff_threshold {
                    interval = (interval * 2).min(config.idle_backoff_max_secs);
                    tracing::debug!(interval, consecutive_empty, "idle, backing off");
                }
            }
            Ok(handled) => {
                tracing::info!(handled, "replay pass handled rows, resetting backoff");
                consecutive_empty = 0;
                interval = config.interval_secs;
            }
            Err(e) => {
                tracing::error!(error = %e, "replay pass failed, will retry next tick");
            }
        }

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("replayer received shutdown signal, stopping continuous mode");
                return Ok(());
            }
            _ = tokio::time::sleep(std::time::Duration::from_secs(interval)) => {}
        }
    }
}
