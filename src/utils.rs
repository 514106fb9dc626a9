//! Utility functions for text cleaning, timestamp parsing, and file system checks.
//!
//! - Text cleaning for scraped titles and descriptions
//! - Lenient ISO-8601 timestamp parsing
//! - Slugification for output file names
//! - File system validation for output directories

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Longest title or description kept, in characters.
pub const MAX_TEXT_CHARS: usize = 500;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Clean scraped text.
///
/// Strips anything that looks like an HTML tag, collapses whitespace runs to
/// single spaces, trims, and truncates to [`MAX_TEXT_CHARS`] characters with a
/// trailing `...`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_text("  Hello\n\t <b>world</b> "), "Hello world");
/// ```
pub fn clean_text(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, "");
    let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
    let trimmed = collapsed.trim();

    if trimmed.chars().count() > MAX_TEXT_CHARS {
        let mut out: String = trimmed.chars().take(MAX_TEXT_CHARS).collect();
        out.push_str("...");
        out
    } else {
        trimmed.to_string()
    }
}

/// Parse a timestamp exchanged with collaborators.
///
/// Accepts RFC 3339 (including a trailing `Z`) and falls back to a naive
/// `YYYY-MM-DDTHH:MM:SS[.f]` or `YYYY-MM-DD HH:MM:SS[.f]`, read as UTC.
/// Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` characters with an ellipsis and the number
/// of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Convert a category name to a file-name-friendly slug.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("Tech News"), "tech-news");
/// ```
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-' && c != '_', "")
        .replace(' ', "-")
}

/// Capitalize the first character of a string.
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_and_strips() {
        assert_eq!(clean_text("  Hello\n\t  world  "), "Hello world");
        assert_eq!(clean_text("<b>Bold</b> <i>move</i>"), "Bold move");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_clean_text_no_double_space_where_tag_was() {
        assert_eq!(clean_text("a <x> b"), "a b");
        assert_eq!(clean_text("line<br/>\n  next"), "line next");
    }

    #[test]
    fn test_clean_text_truncates_on_char_boundary() {
        let long = "新".repeat(600);
        let cleaned = clean_text(&long);
        assert!(cleaned.ends_with("..."));
        assert_eq!(cleaned.chars().count(), MAX_TEXT_CHARS + 3);

        let exact = "a".repeat(MAX_TEXT_CHARS);
        assert_eq!(clean_text(&exact), exact);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let z = parse_timestamp("2025-05-06T10:00:00Z").unwrap();
        let offset = parse_timestamp("2025-05-06T12:00:00+02:00").unwrap();
        assert_eq!(z, offset);

        let naive = parse_timestamp("2025-05-06T10:00:00.123456").unwrap();
        assert_eq!(naive.format("%H:%M:%S").to_string(), "10:00:00");
        assert!(parse_timestamp("2025-05-06 10:00:00").is_some());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("06/05/2025").is_none());
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 100), "short");
        let result = truncate_for_log(&"a".repeat(500), 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Tech"), "tech");
        assert_eq!(slugify("World News!"), "world-news");
        assert_eq!(slugify("  finance_daily "), "finance_daily");
    }

    #[test]
    fn test_upcase() {
        assert_eq!(upcase("tech"), "Tech");
        assert_eq!(upcase(""), "");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        ensure_writable_dir(nested.to_str().unwrap()).await.unwrap();
        assert!(nested.is_dir());
    }
}
