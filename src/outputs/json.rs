//! JSON files in the data directory.
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── news_data_20250506_120000.json   # raw fetch records of one run
//! ├── latest.json                      # copy of the newest snapshot
//! └── stats.json                       # counts of the last run
//! ```

use crate::error::OutputError;
use crate::fetcher::{FetchOutcome, FetchStats};
use crate::models::{FetchRecord, RunStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

pub const LATEST_SNAPSHOT: &str = "latest.json";
pub const STATS_FILE: &str = "stats.json";

#[derive(Serialize)]
struct SnapshotCategory<'a> {
    name: &'a str,
    records: &'a [FetchRecord],
}

#[derive(Serialize)]
struct Snapshot<'a> {
    timestamp: DateTime<Utc>,
    categories: Vec<SnapshotCategory<'a>>,
    stats: &'a FetchStats,
}

#[derive(Serialize)]
struct CategoryCount<'a> {
    category: &'a str,
    items: usize,
}

#[derive(Serialize)]
struct StatsFile<'a> {
    timestamp: DateTime<Utc>,
    total_sources: usize,
    successful_sources: usize,
    total_items: usize,
    items_per_category: Vec<CategoryCount<'a>>,
    rss_files: usize,
    html_pages: usize,
    elapsed_secs: f64,
}

/// `news_data_YYYYMMDD_HHMMSS.json` for a run started at `at`.
pub fn snapshot_file_name(at: DateTime<Utc>) -> String {
    format!("news_data_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Write the raw fetch records of a run, then refresh `latest.json`.
///
/// Returns the path of the timestamped snapshot.
#[instrument(level = "info", skip_all, fields(data_dir = %data_dir.display()))]
pub async fn write_snapshot(data_dir: &Path, outcome: &FetchOutcome) -> Result<PathBuf, OutputError> {
    let snapshot = Snapshot {
        timestamp: outcome.stats.timestamp,
        categories: outcome
            .categories
            .iter()
            .map(|(name, records)| SnapshotCategory { name, records })
            .collect(),
        stats: &outcome.stats,
    };
    let json = serde_json::to_string_pretty(&snapshot)?;

    fs::create_dir_all(data_dir).await?;
    let path = data_dir.join(snapshot_file_name(outcome.stats.timestamp));
    fs::write(&path, &json).await?;
    info!(path = %path.display(), bytes = json.len(), "Wrote raw snapshot");

    let latest = data_dir.join(LATEST_SNAPSHOT);
    fs::copy(&path, &latest).await?;
    info!(path = %latest.display(), "Updated latest snapshot");

    Ok(path)
}

/// Write `stats.json` summarizing the run and the files it produced.
#[instrument(level = "info", skip_all, fields(data_dir = %data_dir.display()))]
pub async fn write_stats(
    data_dir: &Path,
    stats: &RunStats,
    rss_files: usize,
    html_pages: usize,
) -> Result<PathBuf, OutputError> {
    let file = StatsFile {
        timestamp: stats.timestamp,
        total_sources: stats.total_sources,
        successful_sources: stats.successful_sources,
        total_items: stats.total_items,
        items_per_category: stats
            .items_per_category
            .iter()
            .map(|(category, items)| CategoryCount {
                category,
                items: *items,
            })
            .collect(),
        rss_files,
        html_pages,
        elapsed_secs: stats.elapsed_secs,
    };
    let json = serde_json::to_string_pretty(&file)?;

    fs::create_dir_all(data_dir).await?;
    let path = data_dir.join(STATS_FILE);
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote run stats");
    Ok(path)
}
