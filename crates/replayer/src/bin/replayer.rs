//! replayer — batch reconciler for LocalCheckpointDB (§4.11). One-shot
//! `--date YYYY-MM-DD` mode, or continuous mode (the default when `--date`
//! is omitted) that wakes every `--interval` seconds and backs off while idle.

use chrono::NaiveDate;
use clap::Parser;
use pipeline_checkpoint::{CheckpointConfig, CheckpointDb};
use pipeline_llm::{ClassifierClient, ClassifierConfig};
use pipeline_store::{StoreClient, StoreConfig};
use replayer::ReplayerConfig;

/// LocalCheckpointDB-to-Store reconciler.
#[derive(Parser, Debug)]
#[command(name = "replayer", version, about)]
struct Cli {
    /// Run once against this date (YYYY-MM-DD) then exit. Omit for
    /// continuous mode against today.
    #[arg(long)]
    date: Option<String>,

    /// Override the configured batch size for this invocation.
    #[arg(long)]
    batch: Option<u32>,

    /// Override the configured retry count for this invocation.
    #[arg(long)]
    retries: Option<u32>,

    /// Skip the Classifier call for rows that don't match the
    /// negative-keyword shortcut, leaving them for a later AI-enabled pass.
    #[arg(long)]
    no_ai: bool,

    /// Force continuous mode even when `--date` is given.
    #[arg(long)]
    continuous: bool,

    /// Override the configured continuous-mode poll interval (seconds).
    #[arg(long)]
    interval: Option<u64>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pipeline_core::config::load_dotenv();
    pipeline_core::config::init_tracing();
    let cli = Cli::parse();

    let mut config = ReplayerConfig::from_env();
    if let Some(batch) = cli.batch {
        config.batch_size = batch;
    }
    if let Some(retries) = cli.retries {
        config.max_retries = retries;
    }
    if let Some(interval) = cli.interval {
        config.interval_secs = interval;
    }

    let checkpoint_config = CheckpointConfig::from_env();
    let checkpoint = CheckpointDb::open(&checkpoint_config.db_path, checkpoint_config.wal_mode).await?;

    let store_config = StoreConfig::from_env();
    store_config.log_summary();
    let store = StoreClient::connect(&store_config).await?;

    let classifier_config = ClassifierConfig::from_env();
    classifier_config.log_summary();
    let classifier = ClassifierClient::new(classifier_config);

    // No `--date` and no `--continuous` ⇒ continuous mode against today,
    // matching the Python tool's argparse shape (no positional date means
    // "keep running").
    let run_continuous = cli.continuous || cli.date.is_none();

    if run_continuous {
        tracing::info!(interval = config.interval_secs, "replayer starting in continuous mode");
        replayer::continuous::run_continuous(&config, &checkpoint, &store, &classifier, cli.no_ai, shutdown_signal())
            .await?;
        return Ok(());
    }

    let date = cli
        .date
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid --date: {e}"))?
        .expect("checked above: one-shot mode only reached when --date is Some");

    let handled = replayer::run_once(date, &config, &checkpoint, &store, &classifier, cli.no_ai).await?;
    tracing::info!(%date, handled, "replayer one-shot pass complete");
    Ok(())
}
