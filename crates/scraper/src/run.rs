//! The scraper run-loop shared by both exchanges: fetch a window, checkpoint
//! it, enqueue anything new in chronological order, and rewrite the cursor.
//! Everything exchange-specific lives behind the `fetch` closure passed in by
//! each binary; this module only knows about [`FetchedItem`]s.

use std::sync::Arc;
use std::time::Duration;

use pipeline_checkpoint::{CheckpointDb, RawAnnouncementRow};
use pipeline_core::job::{queue_names, AiProcessingPayload, Job, JobPayload};
use pipeline_core::{derive_corp_id, Exchange};
use pipeline_queue::QueueBroker;

use crate::config::ScraperConfig;
use crate::cursor::{self, Cursor};
use crate::error::ScraperError;
use crate::feed::FetchedItem;

/// One fetch-checkpoint-enqueue pass. Returns the number of newly queued
/// announcements.
pub async fn run_once(
    exchange: Exchange,
    config: &ScraperConfig,
    checkpoint: &CheckpointDb,
    queue: &Arc<dyn QueueBroker>,
    mut items: Vec<FetchedItem>,
) -> Result<usize, ScraperError> {
    if items.is_empty() {
        return Ok(0);
    }

    // Oldest-first: both exchanges' feeds are returned newest-first, so the
    // enqueue order (and therefore downstream processing order) must be
    // reversed to match "process in the order filed".
    items.sort_by_key(|i| i.event_datetime);

    let raw_rows: Vec<RawAnnouncementRow> = items
        .iter()
        .map(|item| RawAnnouncementRow {
            news_id: item.news_id.clone(),
            scrip_cd: item.security_id.clone(),
            headline: item.headline.clone(),
            raw_json: item.raw.to_string(),
        })
        .collect();
    checkpoint.save_raw_fetch(raw_rows, "fetch_data", &config.exchange).await?;

    let previous_cursor = cursor::load(&config.cursor_path)?;
    let mut queued = 0usize;
    let mut newest_seen: Option<Cursor> = previous_cursor.clone();

    for item in &items {
        if let Some(prev) = &previous_cursor {
            if cursor::is_same_as_cursor(prev, &item.news_id, &item.headline) {
                continue;
            }
        }

        let corp_id = derive_corp_id(exchange, &item.news_id);
        let marker_key = format!("ann:queued:{corp_id}");
        let newly_marked = queue
            .set_marker_if_absent(&marker_key, Duration::from_secs(config.queued_marker_ttl_secs))
            .await?;
        if !newly_marked {
            tracing::debug!(%corp_id, news_id = %item.news_id, "already queued, skipping");
            continue;
        }

        let payload = AiProcessingPayload {
            corp_id,
            announcement: item.raw.clone(),
            pdf_url: item.pdf_url.clone(),
            company_name: item.company_name.clone(),
            security_id: item.security_id.clone(),
        };
        let job = Job::new(
            JobPayload::AiProcessing(payload),
            config.ai_job_max_retries,
            config.ai_job_timeout_secs,
        );
        queue.enqueue(queue_names::AI_PROCESSING, &job).await?;
        queued += 1;

        newest_seen = Some(Cursor { news_id: item.news_id.clone(), headline: item.headline.clone() });
    }

    if let Some(latest) = newest_seen {
        cursor::save(&config.cursor_path, &latest)?;
    }

    tracing::info!(exchange = %exchange, queued, fetched = items.len(), "scraper pass complete");
    Ok(queued)
}
