//! Replayer (§4.11): after an outage, reconcile LocalCheckpointDB with Store
//! by re-running whatever stage a row never reached — ensure PDF, classify,
//! checkpoint, insert. One-shot `--date` mode and a continuous mode that
//! backs off when idle, grounded on `original_source/workers/replay_processor.py`'s
//! `fetch_rows_needing_processing`/`run_continuous_replay`.

pub mod config;
pub mod continuous;
pub mod error;
pub mod pdf;
pub mod reconcile;

pub use config::ReplayerConfig;
pub use error::ReplayerError;

use chrono::NaiveDate;
use pipeline_checkpoint::CheckpointDb;
use pipeline_llm::ClassifierClient;
use pipeline_store::StoreClient;

/// One reconciliation pass over rows needing work on `date`. Processes each
/// row to completion before moving to the next; one row's failure is logged
/// and does not abort the rest of the batch — the next pass will pick it
/// back up since its checkpoint columns are unchanged.
pub async fn run_once(
    date: NaiveDate,
    config: &ReplayerConfig,
    checkpoint: &CheckpointDb,
    store: &StoreClient,
    classifier: &ClassifierClient,
    skip_llm: bool,
) -> Result<u32, ReplayerError> {
    let client = reqwest::Client::new();
    let rows = checkpoint.rows_needing_work(date, config.batch_size).await?;
    let found = rows.len() as u32;
    if found == 0 {
        return Ok(0);
    }

    let mut handled = 0u32;
    for row in &rows {
        match reconcile_with_retries(&client, checkpoint, store, classifier, row, config, skip_llm).await {
            Ok(()) => handled += 1,
            Err(e) => tracing::error!(news_id = %row.news_id, error = %e, "replay row failed, leaving for next pass"),
        }
    }

    tracing::info!(date = %date, found, handled, "replay pass complete");
    Ok(handled)
}

/// Retries one row up to `config.max_retries` times with a short fixed
/// backoff between attempts — this is a recovery tool run well after the
/// fact, not a latency-sensitive worker, so a simple fixed wait is enough.
async fn reconcile_with_retries(
    client: &reqwest::Client,
    checkpoint: &CheckpointDb,
    store: &StoreClient,
    classifier: &ClassifierClient,
    row: &pipeline_checkpoint::CheckpointRow,
    config: &ReplayerConfig,
    skip_llm: bool,
) -> Result<(), ReplayerError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match reconcile::reconcile_row(client, checkpoint, store, classifier, row, &config.pdf_dir, skip_llm).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= config.max_retries => return Err(e),
            Err(e) => {
                tracing::warn!(news_id = %row.news_id, attempt, error = %e, "replay attempt failed, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        }
    }
}
