//! # Awful Ticker Feed
//!
//! Builds a time-ranged feed of news-like text items for a ticker or topic
//! and exports it as CSV (and optionally JSON).
//!
//! ## Features
//!
//! - Live mode crawls Google News RSS search results for the scope
//! - Synthetic mode asks an OpenAI-compatible LLM to generate items
//! - Long ranges are split into bounded chunks fetched a few at a time
//! - Failed chunks are skipped; a rejected credential stops the run
//! - Ctrl-C stops the run after the current window, keeping what arrived
//!
//! ## Usage
//!
//! ```sh
//! awful_ticker_feed -s AAPL --start 2024-01-01 --end 2024-04-01 -o ./aapl.csv
//! ```
//!
//! ## Architecture
//!
//! 1. **Planning**: Split the date range into chunks sized by density
//! 2. **Fetching**: Run chunks in windows of `concurrency`, pausing between windows
//! 3. **Accumulating**: Append each chunk's items as it resolves
//! 4. **Output**: Write the CSV export and JSON snapshot

use clap::Parser;
use std::error::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod accumulator;
mod api;
mod cli;
mod config;
mod error;
mod fetch;
mod models;
mod outputs;
mod planner;
mod progress;
mod scheduler;
mod utils;

use accumulator::ResultAccumulator;
use cli::Cli;
use config::{FeedSettings, RunRequest};
use error::FeedError;
use fetch::{FeedFetcher, LiveSearchFetcher, SyntheticFetcher};
use models::{FeedSnapshot, FetchMode};
use outputs::{csv, json};
use progress::TracingReporter;
use scheduler::BatchScheduler;
use utils::ensure_writable_parent;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ticker_feed starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let settings = match &args.config {
        Some(path) => FeedSettings::load(path).await?,
        None => FeedSettings::default(),
    };
    let request = RunRequest::from_cli(args, settings)?;
    info!(
        scope = %request.scope,
        range = %request.range,
        mode = %request.mode,
        density = request.density,
        concurrency = request.scheduler.concurrency,
        "Run configured"
    );

    // Early check: ensure output locations are writable
    for path in std::iter::once(&request.csv_output).chain(request.json_output.iter()) {
        if let Err(e) = ensure_writable_parent(path).await {
            error!(
                path = %path.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    // ---- Plan ----
    if request.range.is_empty() {
        warn!(range = %request.range, "Date range is empty; nothing will be fetched");
    }
    let chunks = planner::plan(&request.range, request.density, request.items_per_request);
    let requested = chunks
        .iter()
        .fold(0usize, |acc, c| acc.saturating_add(c.target_count));
    info!(chunks = chunks.len(), requested, "Planned fetch");

    // ---- Fetcher ----
    let fetcher = build_fetcher(&request).await?;

    // ---- Cancellation on Ctrl-C ----
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current window");
            ctrl_c_token.cancel();
        }
    });

    // ---- Run ----
    let mut accumulator = ResultAccumulator::new();
    let mut scheduler = BatchScheduler::new(request.scheduler);
    let run_result = scheduler
        .run(
            &chunks,
            &request.scope,
            &fetcher,
            &mut accumulator,
            &TracingReporter,
            &cancel,
        )
        .await;
    let state = scheduler.state();
    debug!(
        running = state.is_running,
        items = state.total_succeeded,
        failed = state.total_failed,
        "Scheduler state after run"
    );

    if accumulator.is_empty() {
        warn!("No items were fetched");
    }

    if !request.exclude_sources.is_empty() {
        let removed = accumulator.remove_sources(&request.exclude_sources);
        info!(removed, sources = ?request.exclude_sources, "Excluded sources");
    }

    // ---- Output ----
    // Partial results are exported even when the run was aborted.
    if let Err(e) = csv::write_csv(accumulator.all(), &request.csv_output).await {
        error!(error = %e, "Failed to write CSV");
        return Err(e);
    }

    if let Some(path) = &request.json_output {
        let snapshot = FeedSnapshot::new(
            &request.scope,
            fetcher.mode(),
            request.range,
            accumulator.all().to_vec(),
        );
        if let Err(e) = json::write_snapshot(&snapshot, path).await {
            error!(error = %e, "Failed to write JSON snapshot");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        items = accumulator.count(),
        "Execution complete"
    );

    let summary = run_result?;
    debug!(?summary, "Run summary");
    Ok(())
}

/// Construct the fetcher for the requested mode.
#[instrument(level = "info", skip_all, fields(mode = %request.mode))]
async fn build_fetcher(request: &RunRequest) -> Result<FeedFetcher, FeedError> {
    match request.mode {
        FetchMode::LiveSearch => {
            let mut fetcher = LiveSearchFetcher::new(request.user_agent.as_deref())
                .map_err(|e| FeedError::Config(format!("building HTTP client: {e}")))?;
            if let Some(url) = &request.search_url {
                fetcher = fetcher.with_base_url(url.as_str());
            }
            Ok(FeedFetcher::Live(fetcher))
        }
        FetchMode::Synthetic => {
            let fetcher =
                SyntheticFetcher::load(request.llm_config.as_deref(), &request.template).await?;
            Ok(FeedFetcher::Synthetic(fetcher))
        }
    }
}
