//! # News Aggregator
//!
//! Scrapes categorized news sources described entirely by configuration
//! (one URL plus CSS selectors per source) and publishes the result as RSS
//! feeds and static HTML pages.
//!
//! ## Usage
//!
//! ```sh
//! news_aggregator -c config.yaml
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Fetching**: every enabled source of a category concurrently, with
//!    retries and backoff (categories one after another)
//! 2. **Extraction**: selector-driven parsing of each page into items
//! 3. **Normalization**: dedup by link, age filter, newest first
//! 4. **Output**: RSS feeds, HTML pages, raw snapshot and stats JSON
//!
//! Only configuration and output-directory problems stop a run. Source
//! failures are recorded, and renderer failures are logged after the
//! pipeline result already exists.

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use news_aggregator::cli::Cli;
use news_aggregator::config::AppConfig;
use news_aggregator::fetcher::{CancelSignal, FetchEngine};
use news_aggregator::outputs::{html, json, rss};
use news_aggregator::run::{RunReport, run_pipeline};
use news_aggregator::utils::ensure_writable_dir;

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    let config = match AppConfig::load(&args.config) {
        Ok(config) => {
            init_tracing(&config.logging.level);
            config
        }
        Err(e) => {
            init_tracing("info");
            error!(path = %args.config, error = %e, "Failed to load configuration");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run aborted");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn run(args: Cli, mut config: AppConfig) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "news_aggregator starting up");
    debug!(?args, "Parsed CLI arguments");

    // ---- Sources ----
    let mut registry = config.registry()?;
    if !args.categories.is_empty() {
        for name in &args.categories {
            if !registry.categories().any(|c| c == name.as_str()) {
                warn!(category = %name, "Requested category is not configured");
            }
        }
        registry = registry.restrict_to(&args.categories);
        if registry.is_empty() {
            return Err(format!(
                "none of the requested categories are configured: {}",
                args.categories.join(", ")
            )
            .into());
        }
    }

    // ---- CLI overrides ----
    if let Some(hours) = args.max_age_hours {
        config.filter.max_age_hours = hours;
    }
    if let Some(workers) = args.workers {
        config.fetcher.max_workers = usize::from(workers);
    }
    info!(
        categories = registry.len(),
        max_age_hours = config.filter.max_age_hours,
        workers = config.fetcher.max_workers,
        "Configuration ready"
    );

    // ---- Early check: output dirs are writable ----
    let save_snapshot = config.storage.save_snapshots && !args.no_save;
    for dir in [&config.rss.output_dir, &config.html.output_dir, &config.storage.data_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Output directory is not writable");
            return Err(format!("output directory {dir} is not writable: {e}").into());
        }
    }

    // ---- Fetch, extract, normalize ----
    let (cancel_handle, cancel_signal) = CancelSignal::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling in-flight fetches");
            cancel_handle.cancel();
        }
    });

    let engine = FetchEngine::new(config.fetcher.fetch_settings()).with_cancel(cancel_signal);
    let report = run_pipeline(&registry, &engine, config.filter.max_age_hours).await;
    engine.shutdown();

    // ---- Outputs ----
    write_outputs(&config, &report, save_snapshot).await;

    println!("{}", report.stats);

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Run every renderer. Failures are logged and never abort the others.
async fn write_outputs(config: &AppConfig, report: &RunReport, save_snapshot: bool) {
    let now = Utc::now();
    let data_dir = Path::new(&config.storage.data_dir);

    let rss_files = match rss::write_feeds(&config.rss, &report.categories, &report.all_items, now).await {
        Ok(paths) => paths.len(),
        Err(e) => {
            error!(error = %e, "Failed to write RSS feeds");
            0
        }
    };

    let html_pages = match html::write_site(&config.html, &config.rss, &report.categories, &report.stats, now).await {
        Ok(paths) => paths.len(),
        Err(e) => {
            error!(error = %e, "Failed to write HTML pages");
            0
        }
    };

    if save_snapshot {
        if let Err(e) = json::write_snapshot(data_dir, &report.fetch).await {
            error!(error = %e, "Failed to write raw snapshot");
        }
    } else {
        info!("Raw snapshot disabled");
    }

    if let Err(e) = json::write_stats(data_dir, &report.stats, rss_files, html_pages).await {
        error!(error = %e, "Failed to write stats");
    }
}
