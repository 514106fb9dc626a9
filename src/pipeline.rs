//! Normalization: deduplicate, filter by age, and sort items by recency.
//!
//! All functions are pure. The `_at` variants take `now` explicitly so tests
//! can pin the clock.
//!
//! # Timestamp policy
//!
//! Items whose `published_at` is missing or unparsable are kept by the age
//! filter and sort as if published "now", which puts them ahead of every
//! older dated item. This favors recall for scraped pages with messy dates.

use crate::models::Item;
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use std::cmp::Reverse;
use tracing::{debug, info};

pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// Keep the first item for each link, preserving input order. Items with an
/// empty link are dropped.
pub fn deduplicate(items: Vec<Item>) -> Vec<Item> {
    let before = items.len();
    let unique: Vec<Item> = items
        .into_iter()
        .filter(|item| !item.link.is_empty())
        .unique_by(|item| item.link.clone())
        .collect();
    debug!(before, after = unique.len(), "Deduplicated items");
    unique
}

/// Drop items published strictly before `now - max_age_hours`.
///
/// A window reaching past the representable date range means no cutoff.
pub fn filter_by_age(items: Vec<Item>, max_age_hours: i64) -> Vec<Item> {
    filter_by_age_at(items, max_age_hours, Utc::now())
}

pub fn filter_by_age_at(items: Vec<Item>, max_age_hours: i64, now: DateTime<Utc>) -> Vec<Item> {
    let cutoff = Duration::try_hours(max_age_hours).and_then(|window| now.checked_sub_signed(window));
    if cutoff.is_none() {
        debug!(max_age_hours, "Age window exceeds the date range; keeping every item");
    }
    let before = items.len();
    let kept: Vec<Item> = items
        .into_iter()
        .filter(|item| match (item.published(), cutoff) {
            (Some(published), Some(cutoff)) => published >= cutoff,
            (Some(_), None) => true,
            (None, _) => {
                debug!(id = %item.id, raw = ?item.published_at, "Keeping item with unusable timestamp");
                true
            }
        })
        .collect();
    debug!(before, after = kept.len(), ?cutoff, "Filtered items by age");
    kept
}

/// Newest first. Ties keep their input order.
pub fn sort_by_recency(items: Vec<Item>) -> Vec<Item> {
    sort_by_recency_at(items, Utc::now())
}

pub fn sort_by_recency_at(mut items: Vec<Item>, now: DateTime<Utc>) -> Vec<Item> {
    items.sort_by_key(|item| Reverse(item.published().unwrap_or(now)));
    items
}

/// [`deduplicate`], then [`filter_by_age`], then [`sort_by_recency`].
pub fn normalize(items: Vec<Item>, max_age_hours: i64) -> Vec<Item> {
    normalize_at(items, max_age_hours, Utc::now())
}

pub fn normalize_at(items: Vec<Item>, max_age_hours: i64, now: DateTime<Utc>) -> Vec<Item> {
    let before = items.len();
    let items = deduplicate(items);
    let items = filter_by_age_at(items, max_age_hours, now);
    let items = sort_by_recency_at(items, now);
    info!(before, after = items.len(), "Normalized items");
    items
}
