//! CLI entry point for the GTFS-RT trip update poller.
//!
//! Reads a JSON file describing one or more feed sources, then polls every
//! source concurrently on a fixed interval, logging each batch that would be
//! handed to the schedule applier.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gtfs_rt_ingest::config::SourceConfig;
use gtfs_rt_ingest::fetch::BasicClient;
use gtfs_rt_ingest::source::{PollOutcome, TripUpdateSource};
use tracing::Instrument;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_ingest")]
#[command(about = "Polls GTFS-RT trip update feeds", long_about = None)]
struct Cli {
    /// Path to a JSON file holding an array of feed source documents
    #[arg(short, long, default_value = "feeds.json")]
    config: String,

    /// Seconds between poll rounds
    #[arg(short, long, default_value_t = 60)]
    interval: u64,

    /// Number of poll rounds to run (0 = poll until interrupted)
    #[arg(short, long, default_value_t = 0)]
    rounds: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_rt_ingest.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_ingest.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let sources = load_sources(&cli.config, Duration::from_secs(cli.timeout))?;
    info!(source_count = sources.len(), "Sources configured");

    poll_loop(&sources, cli.interval, cli.rounds).await;

    Ok(())
}

/// Builds one source per document in the config file.
///
/// Configuration errors are fatal: a source with a broken document is
/// unusable, and failing here is the only place errors are allowed to
/// escape the ingestion layer.
fn load_sources(path: &str, timeout: Duration) -> Result<Vec<Arc<TripUpdateSource>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read source config file '{path}'"))?;
    let documents: Vec<serde_json::Value> = serde_json::from_str(&raw)
        .with_context(|| format!("'{path}' is not a JSON array of source documents"))?;

    let mut sources = Vec::with_capacity(documents.len());
    for document in &documents {
        let config = SourceConfig::from_value(document)?;
        let client = config.build_client(BasicClient::with_timeout(timeout)?)?;
        sources.push(Arc::new(TripUpdateSource::new(&config, client)));
    }
    Ok(sources)
}

/// Polls every source concurrently once per round.
///
/// The loop itself never fails: per-poll failures were already absorbed into
/// the outcome and show up here as "no result" rounds for that feed.
async fn poll_loop(sources: &[Arc<TripUpdateSource>], interval: u64, rounds: usize) {
    if rounds == 0 {
        info!(interval, "Polling indefinitely. Press Ctrl+C to stop.");
    } else {
        info!(rounds, interval, "Starting poll rounds");
    }

    let mut round = 0;
    loop {
        if rounds > 0 && round >= rounds {
            break;
        }
        round += 1;

        let mut tasks = vec![];
        for source in sources {
            let source = source.clone();

            let feed_span = tracing::info_span!(
                "poll_feed",
                feed_id = %source.feed_id(),
                url = %source.url(),
            );

            let task = tokio::spawn(
                async move {
                    match source.poll_updates().await {
                        PollOutcome::Batch(batch) => {
                            info!(
                                updates = batch.updates.len(),
                                dataset_mode = ?batch.dataset_mode,
                                feed_timestamp = ?batch.timestamp,
                                "Batch ready for the schedule applier"
                            );
                        }
                        PollOutcome::FetchFailed => {
                            warn!("No result this round: fetch failed");
                        }
                        PollOutcome::DecodeFailed => {
                            warn!("No result this round: decode failed");
                        }
                    }
                }
                .instrument(feed_span),
            );

            tasks.push(task);
        }

        for task in tasks {
            let _ = task.await;
        }

        if rounds == 0 || round < rounds {
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }

    info!(round, "Finished polling");
}
