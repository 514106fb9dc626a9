//! YAML configuration.
//!
//! Read once at startup from `config.yaml` (or the `--config` path). Every
//! section except `news_sources` is optional and falls back to the defaults
//! below. Category order in the file is the order of every output.
//!
//! ```yaml
//! news_sources:
//!   tech:
//!     - name: Example
//!       url: https://example.com/news
//!       selector: ".story"
//!       link_selector: "a"
//!       title_selector: "h2"
//! fetcher:
//!   timeout: 30
//!   retry_times: 3
//! ```

use crate::error::ConfigError;
use crate::fetcher::{DEFAULT_USER_AGENT, DEFAULT_WORKERS, FetchSettings};
use crate::models::{SelectorConfig, Source, SourceRegistry};
use crate::pipeline::DEFAULT_MAX_AGE_HOURS;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Category name to list of sources. Kept as a raw mapping so category
    /// order survives and one bad entry cannot sink the whole file.
    pub news_sources: Option<Mapping>,
    pub fetcher: FetcherConfig,
    pub filter: FilterConfig,
    pub rss: RssConfig,
    pub html: HtmlConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Seconds per request.
    pub timeout: u64,
    pub retry_times: u32,
    /// Seconds to wait after each successful fetch.
    pub delay_between_requests: f64,
    pub user_agent: String,
    pub max_workers: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            retry_times: 3,
            delay_between_requests: 2.0,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_workers: DEFAULT_WORKERS,
        }
    }
}

impl FetcherConfig {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.timeout),
            max_retries: self.retry_times,
            request_delay: seconds(self.delay_between_requests).unwrap_or_default(),
            max_workers: self.max_workers,
            user_agent: self.user_agent.clone(),
            ..FetchSettings::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub max_age_hours: i64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RssConfig {
    pub output_dir: String,
    pub title: String,
    /// Public URL the feeds are served from; used for channel links.
    pub base_url: String,
    pub language: String,
    pub author: String,
    /// Minutes.
    pub ttl: u32,
    pub max_items_per_feed: usize,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            output_dir: "rss".to_string(),
            title: "News Aggregator".to_string(),
            base_url: String::new(),
            language: "zh-CN".to_string(),
            author: "Auto News Aggregator".to_string(),
            ttl: 180,
            max_items_per_feed: 50,
        }
    }
}

/// Colour scheme of the generated pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Modern,
    Dark,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HtmlConfig {
    pub output_dir: String,
    pub title: String,
    pub theme: Theme,
    pub max_items_per_category: usize,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            output_dir: "docs".to_string(),
            title: "News Aggregator".to_string(),
            theme: Theme::Modern,
            max_items_per_category: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub save_snapshots: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            save_snapshots: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One entry under a category in `news_sources`.
#[derive(Debug, Deserialize)]
struct SourceEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    fetch_delay: Option<f64>,
    #[serde(flatten)]
    selectors: SelectorConfig,
}

fn default_enabled() -> bool {
    true
}

fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

impl AppConfig {
    /// Read and validate the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::parse(&content, path)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration text. `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match &self.news_sources {
            None => return Err(ConfigError::Invalid("missing news_sources".to_string())),
            Some(sources) if sources.is_empty() => {
                return Err(ConfigError::Invalid(
                    "news_sources must define at least one category".to_string(),
                ));
            }
            Some(_) => {}
        }
        if self.fetcher.max_workers == 0 {
            return Err(ConfigError::Invalid(
                "fetcher.max_workers must be at least 1".to_string(),
            ));
        }
        if self.fetcher.timeout == 0 {
            return Err(ConfigError::Invalid(
                "fetcher.timeout must be at least 1 second".to_string(),
            ));
        }
        if self.filter.max_age_hours < 0 {
            return Err(ConfigError::Invalid(
                "filter.max_age_hours must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the source registry in file order.
    ///
    /// Sources without a URL and categories without sources are warned about
    /// and contribute nothing. A category key that is not a string is skipped.
    pub fn registry(&self) -> Result<SourceRegistry, ConfigError> {
        let Some(mapping) = &self.news_sources else {
            return Err(ConfigError::Invalid("missing news_sources".to_string()));
        };

        let mut registry = SourceRegistry::default();
        for (key, value) in mapping {
            let Some(category) = key.as_str() else {
                warn!(key = ?key, "Skipping non-string category name");
                continue;
            };
            let sources = category_sources(category, value);
            if sources.is_empty() {
                warn!(%category, "Category has no usable sources");
            }
            debug!(%category, count = sources.len(), "Registered category");
            registry.push(category, sources);
        }

        if registry.is_empty() {
            return Err(ConfigError::Invalid(
                "news_sources must define at least one category".to_string(),
            ));
        }
        Ok(registry)
    }
}

fn category_sources(category: &str, value: &Value) -> Vec<Source> {
    let entries = match value {
        Value::Sequence(entries) => entries.as_slice(),
        Value::Null => return Vec::new(),
        other => {
            warn!(%category, value = ?other, "Expected a list of sources");
            return Vec::new();
        }
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let entry: SourceEntry = match serde_yaml::from_value(entry.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(%category, index, error = %e, "Skipping malformed source entry");
                    return None;
                }
            };
            to_source(category, index, entry)
        })
        .collect()
}

fn to_source(category: &str, index: usize, entry: SourceEntry) -> Option<Source> {
    let url = match entry.url.filter(|u| !u.trim().is_empty()) {
        Some(url) => url,
        None => {
            warn!(%category, index, name = ?entry.name, "Skipping source without url");
            return None;
        }
    };
    let name = entry.name.unwrap_or_else(|| url.clone());

    let fetch_delay = entry.fetch_delay.and_then(|secs| {
        let delay = seconds(secs);
        if delay.is_none() {
            warn!(%category, source = %name, fetch_delay = secs, "Ignoring invalid fetch_delay");
        }
        delay
    });

    let mut source = Source::new(&name, &url, category, entry.selectors);
    source.enabled = entry.enabled;
    source.fetch_delay = fetch_delay;
    Some(source)
}
