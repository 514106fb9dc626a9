//! Data models shared by every pipeline stage.
//!
//! - [`Source`] and [`SelectorConfig`]: what to fetch and how to read it
//! - [`FetchRecord`]: raw result of fetching one source
//! - [`Item`]: one normalized news entry
//! - [`CategoryResult`] and [`RunStats`]: what a run hands to the renderers

use crate::utils::{parse_timestamp, slugify};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// CSS selectors describing how to find items on a source page.
///
/// Interpreted uniformly by [`crate::extract::extract`]; sources never need
/// custom code. The YAML keys `selector` and `desc_selector` are accepted as
/// aliases for `item_selector` and `description_selector`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default, alias = "selector")]
    pub item_selector: Option<String>,
    #[serde(default)]
    pub link_selector: Option<String>,
    #[serde(default)]
    pub title_selector: Option<String>,
    #[serde(default, alias = "desc_selector")]
    pub description_selector: Option<String>,
}

/// One configured news source. Built once from configuration and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub category: String,
    pub enabled: bool,
    pub selectors: SelectorConfig,
    /// Overrides the global inter-request delay for this source.
    pub fetch_delay: Option<Duration>,
}

impl Source {
    pub fn new(name: &str, url: &str, category: &str, selectors: SelectorConfig) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
            enabled: true,
            selectors,
            fetch_delay: None,
        }
    }
}

/// Ordered mapping from category name to its sources, in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRegistry {
    categories: Vec<(String, Vec<Source>)>,
}

impl SourceRegistry {
    /// Append a category. A repeated name extends the existing entry.
    pub fn push(&mut self, category: &str, sources: Vec<Source>) {
        match self.categories.iter_mut().find(|(name, _)| name == category) {
            Some((_, existing)) => existing.extend(sources),
            None => self.categories.push((category.to_string(), sources)),
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Source])> {
        self.categories
            .iter()
            .map(|(name, sources)| (name.as_str(), sources.as_slice()))
    }

    pub fn enabled_sources(&self, category: &str) -> Vec<&Source> {
        self.categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, sources)| sources.iter().filter(|s| s.enabled).collect())
            .unwrap_or_default()
    }

    /// Keep only the named categories, preserving configuration order.
    pub fn restrict_to(self, names: &[String]) -> Self {
        Self {
            categories: self
                .categories
                .into_iter()
                .filter(|(name, _)| names.iter().any(|n| n == name))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }
}

/// Raw outcome of fetching a single source.
///
/// Failure is data: a source that never answered produces a record with
/// `success == false` and empty content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRecord {
    pub source_name: String,
    pub url: String,
    pub category: String,
    pub raw_content: String,
    pub fetched_at: DateTime<Utc>,
    pub success: bool,
}

impl FetchRecord {
    pub fn succeeded(source: &Source, raw_content: String, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source_name: source.name.clone(),
            url: source.url.clone(),
            category: source.category.clone(),
            raw_content,
            fetched_at,
            success: true,
        }
    }

    pub fn failed(source: &Source, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source_name: source.name.clone(),
            url: source.url.clone(),
            category: source.category.clone(),
            raw_content: String::new(),
            fetched_at,
            success: false,
        }
    }
}

/// A normalized news entry extracted from a source page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub source_name: String,
    pub category: String,
    /// Publication time as text. Scraped pages rarely expose one, so this is
    /// normally the fetch time in RFC 3339. May be missing or unparsable when
    /// a source supplies its own value.
    pub published_at: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl Item {
    /// Deterministic identity: lowercase hex SHA-256 over source name, link
    /// and title, separated by `\x1f` so field boundaries cannot shift.
    pub fn generate_id(source_name: &str, link: &str, title: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_name.as_bytes());
        hasher.update([0x1f]);
        hasher.update(link.as_bytes());
        hasher.update([0x1f]);
        hasher.update(title.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Parsed publication time, or `None` when missing or unparsable.
    pub fn published(&self) -> Option<DateTime<Utc>> {
        self.published_at.as_deref().and_then(parse_timestamp)
    }
}

/// Items for one category, already deduplicated, filtered and sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryItems {
    pub name: String,
    /// File stem for this category's feed and page, unique within the run.
    pub slug: String,
    pub items: Vec<Item>,
}

/// Stems the renderers use for their own files (`all.xml`, `index.html`,
/// `feeds.html`). No category gets one of these.
pub const RESERVED_SLUGS: [&str; 3] = ["all", "index", "feeds"];

/// Per-category output of a run, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryResult {
    pub categories: Vec<CategoryItems>,
}

impl CategoryResult {
    pub fn push(&mut self, name: &str, items: Vec<Item>) {
        let slug = self.unique_slug(name);
        self.categories.push(CategoryItems {
            name: name.to_string(),
            slug,
            items,
        });
    }

    /// `slugify(name)`, suffixed with `-2`, `-3`, ... when that stem is
    /// reserved or already taken by an earlier category.
    fn unique_slug(&self, name: &str) -> String {
        let base = match slugify(name) {
            slug if slug.is_empty() => "category".to_string(),
            slug => slug,
        };
        let taken = |slug: &str| {
            RESERVED_SLUGS.contains(&slug) || self.categories.iter().any(|c| c.slug == slug)
        };
        if !taken(&base) {
            return base;
        }
        (2..)
            .map(|n: usize| format!("{base}-{n}"))
            .find(|slug| !taken(slug))
            .unwrap_or(base)
    }

    pub fn get(&self, name: &str) -> Option<&[Item]> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.items.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryItems> {
        self.categories.iter()
    }

    pub fn total_items(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }

    /// Every item of every category, in category order.
    pub fn flatten(&self) -> Vec<Item> {
        self.categories
            .iter()
            .flat_map(|c| c.items.iter().cloned())
            .collect()
    }
}

/// Read-only summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub timestamp: DateTime<Utc>,
    pub total_categories: usize,
    pub total_sources: usize,
    pub successful_sources: usize,
    pub total_items: usize,
    pub items_per_category: Vec<(String, usize)>,
    pub elapsed_secs: f64,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}")?;
        writeln!(f, "News aggregator run summary")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Run at:     {}", self.timestamp.to_rfc3339())?;
        writeln!(
            f,
            "Sources:    {}/{} succeeded",
            self.successful_sources, self.total_sources
        )?;
        writeln!(f, "Items:      {}", self.total_items)?;
        for (category, count) in &self.items_per_category {
            writeln!(f, "  {category}: {count}")?;
        }
        writeln!(f, "Elapsed:    {:.2}s", self.elapsed_secs)?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(link: &str, title: &str) -> Item {
        Item {
            id: Item::generate_id("src", link, title),
            title: title.to_string(),
            link: link.to_string(),
            description: title.to_string(),
            source_name: "src".to_string(),
            category: "tech".to_string(),
            published_at: Some("2025-05-06T10:00:00Z".to_string()),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_id_generation_deterministic() {
        let a = Item::generate_id("Hacker News", "https://example.com/a", "Title");
        let b = Item::generate_id("Hacker News", "https://example.com/a", "Title");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_id_generation_field_boundaries() {
        let a = Item::generate_id("ab", "c", "d");
        let b = Item::generate_id("a", "bc", "d");
        assert_ne!(a, b);
        assert_ne!(
            Item::generate_id("s", "https://example.com/a", "One"),
            Item::generate_id("s", "https://example.com/a", "Two")
        );
    }

    #[test]
    fn test_published_parses_trailing_z() {
        let it = item("https://example.com/a", "A");
        let parsed = it.published().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-05-06T10:00:00+00:00");
    }

    #[test]
    fn test_published_unparsable_is_none() {
        let mut it = item("https://example.com/a", "A");
        it.published_at = Some("yesterday-ish".to_string());
        assert!(it.published().is_none());
        it.published_at = None;
        assert!(it.published().is_none());
    }

    #[test]
    fn test_category_slugs_are_unique_and_avoid_reserved_names() {
        let mut result = CategoryResult::default();
        for name in ["C", "C++", "all", "Index", "feeds", "Tech News", "+++", "c-2"] {
            result.push(name, vec![]);
        }

        let slugs: Vec<&str> = result.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(
            slugs,
            vec!["c", "c-2", "all-2", "index-2", "feeds-2", "tech-news", "category", "c-2-2"]
        );
    }

    #[test]
    fn test_category_result_lookup_and_flatten() {
        let mut result = CategoryResult::default();
        result.push("tech", vec![item("https://a", "A"), item("https://b", "B")]);
        result.push("finance", vec![]);
        result.push("sports", vec![item("https://c", "C")]);

        assert_eq!(result.get("tech").unwrap().len(), 2);
        assert_eq!(result.get("finance").unwrap().len(), 0);
        assert!(result.get("missing").is_none());
        assert_eq!(result.total_items(), 3);

        let links: Vec<_> = result.flatten().into_iter().map(|i| i.link).collect();
        assert_eq!(links, vec!["https://a", "https://b", "https://c"]);
    }

    #[test]
    fn test_registry_keeps_order_and_filters_disabled() {
        let mut off = Source::new("off", "https://off", "tech", SelectorConfig::default());
        off.enabled = false;
        let on = Source::new("on", "https://on", "tech", SelectorConfig::default());

        let mut registry = SourceRegistry::default();
        registry.push("tech", vec![off, on]);
        registry.push("finance", vec![]);
        registry.push("sports", vec![]);

        let order: Vec<_> = registry.categories().collect();
        assert_eq!(order, vec!["tech", "finance", "sports"]);

        let enabled = registry.enabled_sources("tech");
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "on");
        assert!(registry.enabled_sources("missing").is_empty());

        let restricted = registry.restrict_to(&["sports".to_string(), "tech".to_string()]);
        let order: Vec<_> = restricted.categories().collect();
        assert_eq!(order, vec!["tech", "sports"]);
    }

    #[test]
    fn test_fetch_record_failed_has_empty_content() {
        let source = Source::new("s", "https://example.com", "tech", SelectorConfig::default());
        let record = FetchRecord::failed(&source, Utc::now());
        assert!(!record.success);
        assert!(record.raw_content.is_empty());
        assert_eq!(record.category, "tech");
    }

    #[test]
    fn test_run_stats_display() {
        let stats = RunStats {
            total_sources: 2,
            successful_sources: 1,
            total_items: 2,
            items_per_category: vec![("tech".to_string(), 2)],
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("1/2 succeeded"));
        assert!(text.contains("tech: 2"));
    }
}
