//! Run orchestration: fetch every category, extract items from each record,
//! then normalize per category and once more for the combined list.

use crate::client::{HttpGet, Sleeper};
use crate::extract::extract;
use crate::fetcher::{FetchEngine, FetchOutcome};
use crate::models::{CategoryResult, Item, RunStats, SourceRegistry};
use crate::pipeline::{deduplicate, normalize_at, sort_by_recency_at};
use chrono::Utc;
use std::time::Instant;
use tracing::{info, instrument};

/// Everything one run produces, handed to the renderers.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub categories: CategoryResult,
    /// Every category's items, deduplicated and sorted again as one list.
    pub all_items: Vec<Item>,
    pub stats: RunStats,
    pub fetch: FetchOutcome,
}

#[instrument(level = "info", skip_all, fields(categories = registry.len(), max_age_hours = max_age_hours))]
pub async fn run_pipeline<C, S>(
    registry: &SourceRegistry,
    engine: &FetchEngine<C, S>,
    max_age_hours: i64,
) -> RunReport
where
    C: HttpGet,
    S: Sleeper,
{
    let t0 = Instant::now();
    let fetch = engine.fetch_all(registry).await;
    let now = Utc::now();

    let mut categories = CategoryResult::default();
    for (category, records) in &fetch.categories {
        // Records come back in the same order as the enabled sources.
        let sources = registry.enabled_sources(category);
        let items: Vec<Item> = sources
            .iter()
            .zip(records)
            .flat_map(|(source, record)| extract(record, source))
            .collect();

        let extracted = items.len();
        let items = normalize_at(items, max_age_hours, now);
        info!(%category, extracted, kept = items.len(), "Category processed");
        categories.push(category, items);
    }

    let all_items = sort_by_recency_at(deduplicate(categories.flatten()), now);

    let stats = RunStats {
        timestamp: fetch.stats.timestamp,
        total_categories: fetch.stats.total_categories,
        total_sources: fetch.stats.total_sources,
        successful_sources: fetch.stats.successful_sources,
        total_items: categories.total_items(),
        items_per_category: categories
            .iter()
            .map(|c| (c.name.clone(), c.items.len()))
            .collect(),
        elapsed_secs: t0.elapsed().as_secs_f64(),
    };
    info!(
        total_items = stats.total_items,
        combined = all_items.len(),
        successful_sources = stats.successful_sources,
        total_sources = stats.total_sources,
        "Run complete"
    );

    RunReport {
        categories,
        all_items,
        stats,
        fetch,
    }
}
