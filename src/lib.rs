//! # News Aggregator
//!
//! Scrapes categorized news sources described entirely by configuration
//! (one URL plus CSS selectors per source) and publishes the result as RSS
//! feeds and static HTML pages.
//!
//! ## Architecture
//!
//! ```text
//! Fetch engine → Extraction → Normalization → Renderers
//! ```
//!
//! The library never installs a tracing subscriber; the binary does that
//! once at startup.

/// Command-line interface using clap.
pub mod cli;

/// HTTP session and sleep seams.
///
/// - [`HttpGet`](client::HttpGet): one GET returning a 200 body
/// - [`HttpSession`](client::HttpSession): lazily built `reqwest` client
/// - [`Sleeper`](client::Sleeper): every wait goes through this
pub mod client;

/// YAML configuration and the source registry built from it.
pub mod config;

/// Error enums for configuration, fetching, extraction and output.
pub mod error;

/// Selector-driven extraction of items from fetched pages.
pub mod extract;

/// Concurrent fetching with retries, backoff, pacing and cancellation.
pub mod fetcher;

/// Core data models: sources, fetch records, items, run results.
pub mod models;

/// RSS, HTML and JSON renderers.
pub mod outputs;

/// Dedup, age filter and recency sort.
pub mod pipeline;

/// One full run over a registry.
pub mod run;

/// Text cleaning, timestamp parsing and filesystem helpers.
pub mod utils;
