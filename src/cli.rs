//! Command-line interface definitions.
//!
//! Everything except the config path is an override of a value that also
//! lives in the YAML file.

use clap::Parser;

/// Command-line arguments for the news aggregator.
///
/// # Examples
///
/// ```sh
/// # Run every configured category
/// news_aggregator -c config.yaml
///
/// # Only tech and finance, wider age window, no raw snapshot
/// news_aggregator --category tech --category finance --max-age-hours 48 --no-save
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "NEWS_AGGREGATOR_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Drop items published longer ago than this (overrides filter.max_age_hours)
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
    pub max_age_hours: Option<i64>,

    /// Concurrent fetches per category (overrides fetcher.max_workers)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Only run this category; repeat to run several
    #[arg(long = "category", value_name = "NAME")]
    pub categories: Vec<String>,

    /// Skip writing the raw snapshot to the data directory
    #[arg(long)]
    pub no_save: bool,
}
