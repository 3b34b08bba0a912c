//! scraper-bse — polls BSE's `AnnSubCategoryGetData` feed and hands new
//! announcements to the `ai_processing` queue (§4.3).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pipeline_checkpoint::{try_acquire, CheckpointConfig, CheckpointDb};
use pipeline_core::Exchange;
use pipeline_queue::{QueueBroker, QueueConfig, RedisQueueBroker};
use pipeline_scraper::{cursor, BseFeed, ScraperConfig};

/// BSE corporate announcements scraper.
#[derive(Parser, Debug)]
#[command(name = "scraper-bse", version, about)]
struct Cli {
    /// Run a single fetch-and-enqueue pass then exit, instead of polling.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pipeline_core::config::load_dotenv();
    pipeline_core::config::init_tracing();
    let cli = Cli::parse();

    let scraper_config = ScraperConfig::for_exchange("bse");
    scraper_config.log_summary();

    let checkpoint_config = CheckpointConfig::for_scraper("bse");
    let _lock = match try_acquire(&checkpoint_config.lock_path) {
        Ok(lock) => lock,
        Err(e) => {
            tracing::warn!(error = %e, "another scraper-bse instance holds the lock, exiting silently");
            return Ok(());
        }
    };

    let checkpoint = CheckpointDb::open(&checkpoint_config.db_path, checkpoint_config.wal_mode).await?;

    let queue_config = QueueConfig::from_env();
    queue_config.log_summary();
    let queue: Arc<dyn QueueBroker> = Arc::new(RedisQueueBroker::connect(&queue_config).await?);

    let feed = BseFeed::new(
        Duration::from_secs(scraper_config.request_timeout_secs),
        scraper_config.max_fetch_retries,
    )?;

    loop {
        let today = cursor::today_bse_date();
        match feed.fetch_data(&today, &today).await {
            Ok(mut items) => {
                for item in &mut items {
                    if item.isin.is_none() && !item.security_id.is_empty() {
                        match feed.get_isin(&item.security_id).await {
                            Ok(isin) => item.isin = isin,
                            Err(e) => tracing::warn!(error = %e, security_id = %item.security_id, "ISIN lookup failed, continuing without it"),
                        }
                    }
                }
                if let Err(e) =
                    pipeline_scraper::run::run_once(Exchange::Bse, &scraper_config, &checkpoint, &queue, items).await
                {
                    tracing::error!(error = %e, "scraper-bse run_once failed");
                }
            }
            Err(e) => tracing::error!(error = %e, "BSE fetch_data failed for this pass"),
        }

        if cli.once {
            break;
        }
        tokio::time::sleep(Duration::from_secs(scraper_config.poll_interval_secs)).await;
    }

    Ok(())
}
