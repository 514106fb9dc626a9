//! Extraction engine: turns a fetched page into [`Item`]s using the source's
//! [`SelectorConfig`].
//!
//! Every source goes through the same routine. The selectors decide where
//! items, links, titles and descriptions live; nothing here is specific to
//! one site.
//!
//! # Failure granularity
//!
//! - Failed fetch, empty page, missing or invalid `item_selector`: the whole
//!   source yields nothing (warning logged).
//! - Invalid sub-selector or unresolvable link: only that candidate is
//!   skipped.
//! - Candidate without a title or link: skipped silently at debug level.

use crate::error::ExtractError;
use crate::models::{FetchRecord, Item, SelectorConfig, Source};
use crate::utils::{clean_text, truncate_for_log};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Most candidate elements read from one page.
pub const MAX_ITEMS_PER_SOURCE: usize = 20;

/// Attributes checked for a link, in order.
const LINK_ATTRS: [&str; 3] = ["href", "src", "data-url"];

/// Extract items from one fetch record.
#[instrument(level = "info", skip_all, fields(source = %record.source_name))]
pub fn extract(record: &FetchRecord, source: &Source) -> Vec<Item> {
    if !record.success || record.raw_content.trim().is_empty() {
        warn!(success = record.success, "No content to extract");
        return Vec::new();
    }

    let Some(item_selector) = source.selectors.item_selector.as_deref() else {
        warn!("Source has no item selector; not scrapable");
        return Vec::new();
    };

    let item_selector = match parse_selector(item_selector) {
        Ok(selector) => selector,
        Err(e) => {
            warn!(error = %e, "Skipping source");
            return Vec::new();
        }
    };

    let document = Html::parse_document(&record.raw_content);
    let candidates: Vec<ElementRef> = document.select(&item_selector).collect();
    info!(found = candidates.len(), "Matched candidate elements");
    if candidates.is_empty() {
        debug!(
            page_preview = %truncate_for_log(&record.raw_content, 300),
            "Item selector matched nothing"
        );
    }

    let base = Url::parse(&record.url).ok();
    if base.is_none() {
        warn!(url = %record.url, "Source URL is not absolute; relative links will be skipped");
    }

    let items: Vec<Item> = candidates
        .into_iter()
        .take(MAX_ITEMS_PER_SOURCE)
        .enumerate()
        .filter_map(|(index, element)| {
            match extract_candidate(element, &source.selectors, base.as_ref(), record) {
                Ok(Some(item)) => Some(item),
                Ok(None) => {
                    debug!(index, "Candidate lacks a title or link; skipped");
                    None
                }
                Err(e) => {
                    warn!(index, error = %e, "Candidate skipped");
                    None
                }
            }
        })
        .collect();

    info!(count = items.len(), "Extracted items");
    items
}

fn parse_selector(raw: &str) -> Result<Selector, ExtractError> {
    Selector::parse(raw).map_err(|e| ExtractError::Selector {
        selector: raw.to_string(),
        reason: e.to_string(),
    })
}

fn extract_candidate(
    element: ElementRef,
    selectors: &SelectorConfig,
    base: Option<&Url>,
    record: &FetchRecord,
) -> Result<Option<Item>, ExtractError> {
    let link_element = match selectors.link_selector.as_deref() {
        Some(raw) => element.select(&parse_selector(raw)?).next(),
        None => Some(element),
    };
    let link = match link_element.and_then(raw_link) {
        Some(raw) => resolve_link(raw, base)?,
        None => None,
    };

    let title = select_text(element, selectors.title_selector.as_deref())?;
    let description = select_text(element, selectors.description_selector.as_deref())?;

    let (Some(link), Some(title)) = (link, title) else {
        return Ok(None);
    };

    Ok(Some(Item {
        id: Item::generate_id(&record.source_name, &link, &title),
        description: description.unwrap_or_else(|| title.clone()),
        title,
        link,
        source_name: record.source_name.clone(),
        category: record.category.clone(),
        published_at: Some(record.fetched_at.to_rfc3339()),
        fetched_at: record.fetched_at,
    }))
}

/// First non-empty link-like attribute of the element.
fn raw_link<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    LINK_ATTRS
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

/// Absolute http(s) links pass through; everything else is joined against
/// the source URL. Without a usable base, non-absolute links are dropped.
fn resolve_link(raw: &str, base: Option<&Url>) -> Result<Option<String>, ExtractError> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(Some(raw.to_string()));
    }
    let Some(base) = base else {
        return Ok(None);
    };
    base.join(raw)
        .map(|url| Some(url.to_string()))
        .map_err(|source| ExtractError::Url {
            link: raw.to_string(),
            source,
        })
}

/// Cleaned text of the first match of `selector` inside `element`.
fn select_text(element: ElementRef, selector: Option<&str>) -> Result<Option<String>, ExtractError> {
    let Some(raw) = selector else {
        return Ok(None);
    };
    let selector = parse_selector(raw)?;
    Ok(element
        .select(&selector)
        .next()
        .map(|found| clean_text(&found.text().collect::<String>()))
        .filter(|text| !text.is_empty()))
}
