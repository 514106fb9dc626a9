//! RSS 2.0 feeds.
//!
//! One `<slug>.xml` per non-empty category plus `all.xml` for the combined
//! list (no category slug is ever `all`). Each feed is capped at
//! `max_items_per_feed`. Item descriptions and titles are written as escaped
//! text; `pubDate` is RFC 2822 and falls back to the run time when an item's
//! timestamp cannot be parsed.

use crate::config::RssConfig;
use crate::error::OutputError;
use crate::models::{CategoryItems, CategoryResult, Item};
use crate::utils::upcase;
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

const ALL_FEED: &str = "all";
const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

/// File name of the feed with stem `slug`.
pub fn feed_file_name(slug: &str) -> String {
    format!("{slug}.xml")
}

/// Public URL of a feed, or a bare file name when no `base_url` is configured.
pub fn feed_url(config: &RssConfig, slug: &str) -> String {
    let file = feed_file_name(slug);
    if config.base_url.is_empty() {
        file
    } else {
        format!("{}/{}", config.base_url.trim_end_matches('/'), file)
    }
}

/// Channel-level metadata for one feed.
struct Channel<'a> {
    title: String,
    description: String,
    link: String,
    category: Option<&'a str>,
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), OutputError> {
    writer.write_event(event).map_err(quick_xml::Error::from)?;
    Ok(())
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), OutputError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(&xml_safe(text))))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Drop control characters XML 1.0 does not allow.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= '\u{20}')
        .collect()
}

/// `pubDate` value for an item: its own timestamp, or `fallback`.
fn pub_date(item: &Item, fallback: DateTime<Utc>) -> String {
    item.published().unwrap_or(fallback).to_rfc2822()
}

fn render(
    config: &RssConfig,
    channel: &Channel<'_>,
    items: &[Item],
    now: DateTime<Utc>,
) -> Result<String, OutputError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:dc", DC_NAMESPACE));
    emit(&mut writer, Event::Start(rss))?;
    emit(&mut writer, Event::Start(BytesStart::new("channel")))?;

    text_element(&mut writer, "title", &channel.title)?;
    text_element(&mut writer, "link", &channel.link)?;
    text_element(&mut writer, "description", &channel.description)?;
    text_element(&mut writer, "language", &config.language)?;
    text_element(&mut writer, "ttl", &config.ttl.to_string())?;
    text_element(&mut writer, "lastBuildDate", &now.to_rfc2822())?;
    text_element(&mut writer, "generator", env!("CARGO_PKG_NAME"))?;
    text_element(&mut writer, "dc:creator", &config.author)?;
    if let Some(category) = channel.category {
        text_element(&mut writer, "category", category)?;
    }

    for item in items.iter().take(config.max_items_per_feed) {
        emit(&mut writer, Event::Start(BytesStart::new("item")))?;
        text_element(&mut writer, "title", &item.title)?;
        text_element(&mut writer, "link", &item.link)?;
        text_element(&mut writer, "description", &item.description)?;

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        emit(&mut writer, Event::Start(guid))?;
        emit(&mut writer, Event::Text(BytesText::new(&item.id)))?;
        emit(&mut writer, Event::End(BytesEnd::new("guid")))?;

        text_element(&mut writer, "pubDate", &pub_date(item, now))?;
        text_element(&mut writer, "category", &item.category)?;
        text_element(&mut writer, "dc:creator", &item.source_name)?;
        emit(&mut writer, Event::End(BytesEnd::new("item")))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("channel")))?;
    emit(&mut writer, Event::End(BytesEnd::new("rss")))?;

    let mut xml = String::from_utf8(writer.into_inner())?;
    xml.push('\n');
    Ok(xml)
}

/// Render the feed for one category.
pub fn render_category_feed(
    config: &RssConfig,
    category: &CategoryItems,
    now: DateTime<Utc>,
) -> Result<String, OutputError> {
    let name = category.name.as_str();
    let channel = Channel {
        title: format!("{} - {}", config.title, upcase(name)),
        description: format!("Latest {name} news collected by {}", config.title),
        link: feed_url(config, &category.slug),
        category: Some(name),
    };
    render(config, &channel, &category.items, now)
}

/// Render the combined feed across every category.
pub fn render_all_feed(
    config: &RssConfig,
    items: &[Item],
    now: DateTime<Utc>,
) -> Result<String, OutputError> {
    let channel = Channel {
        title: format!("{} - All", config.title),
        description: format!("Latest news from every category collected by {}", config.title),
        link: feed_url(config, ALL_FEED),
        category: None,
    };
    render(config, &channel, items, now)
}

async fn write_feed(dir: &Path, slug: &str, xml: String) -> Result<PathBuf, OutputError> {
    let path = dir.join(feed_file_name(slug));
    fs::write(&path, xml).await?;
    info!(path = %path.display(), "Wrote RSS feed");
    Ok(path)
}

/// Write every category feed and `all.xml` into `config.output_dir`.
///
/// Empty categories get no feed. Returns the written paths.
#[instrument(level = "info", skip_all, fields(output_dir = %config.output_dir))]
pub async fn write_feeds(
    config: &RssConfig,
    categories: &CategoryResult,
    all_items: &[Item],
    now: DateTime<Utc>,
) -> Result<Vec<PathBuf>, OutputError> {
    let dir = Path::new(&config.output_dir);
    fs::create_dir_all(dir).await?;

    let mut written = Vec::new();
    for category in categories.iter() {
        if category.items.is_empty() {
            warn!(category = %category.name, "No items; skipping feed");
            continue;
        }
        let xml = render_category_feed(config, category, now)?;
        written.push(write_feed(dir, &category.slug, xml).await?);
    }

    if all_items.is_empty() {
        warn!("No items at all; skipping combined feed");
    } else {
        let xml = render_all_feed(config, all_items, now)?;
        written.push(write_feed(dir, ALL_FEED, xml).await?);
    }

    info!(feeds = written.len(), "RSS generation complete");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    fn item(title: &str, link: &str, published_at: Option<&str>) -> Item {
        Item {
            id: Item::generate_id("Wire", link, title),
            title: title.to_string(),
            link: link.to_string(),
            description: format!("About {title}"),
            source_name: "Wire".to_string(),
            category: "tech".to_string(),
            published_at: published_at.map(String::from),
            fetched_at: now(),
        }
    }

    fn config() -> RssConfig {
        RssConfig {
            base_url: "https://feeds.example.com/rss/".to_string(),
            ..RssConfig::default()
        }
    }

    #[test]
    fn test_feed_urls() {
        assert_eq!(feed_url(&config(), "tech-news"), "https://feeds.example.com/rss/tech-news.xml");
        assert_eq!(feed_url(&RssConfig::default(), "all"), "all.xml");
    }

    #[test]
    fn test_category_feed_contents() {
        let mut categories = CategoryResult::default();
        categories.push("tech", vec![item("Rust <2025> & friends", "https://example.com/a", Some("2025-05-06T10:00:00Z"))]);
        let tech = &categories.categories[0];

        let xml = render_category_feed(&config(), tech, now()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<rss version=\"2.0\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\">"));
        assert!(xml.contains("<title>News Aggregator - Tech</title>"));
        assert!(xml.contains("<language>zh-CN</language>"));
        assert!(xml.contains("<ttl>180</ttl>"));
        assert!(xml.contains("<title>Rust &lt;2025&gt; &amp; friends</title>"));
        assert!(xml.contains(&format!("<guid isPermaLink=\"false\">{}</guid>", tech.items[0].id)));
        let published = Utc.with_ymd_and_hms(2025, 5, 6, 10, 0, 0).unwrap();
        assert!(xml.contains(&format!("<pubDate>{}</pubDate>", published.to_rfc2822())));
        assert!(xml.contains("<dc:creator>Wire</dc:creator>"));
        assert!(xml.contains("<category>tech</category>"));
    }

    #[test]
    fn test_unparsable_pub_date_falls_back_to_run_time() {
        let items = vec![item("A", "https://example.com/a", Some("not a date"))];

        let xml = render_all_feed(&config(), &items, now()).unwrap();

        assert!(xml.contains(&format!("<pubDate>{}</pubDate>", now().to_rfc2822())));
        assert!(xml.contains("<title>News Aggregator - All</title>"));
    }

    #[test]
    fn test_feed_is_capped() {
        let config = RssConfig {
            max_items_per_feed: 3,
            ..config()
        };
        let mut categories = CategoryResult::default();
        categories.push(
            "tech",
            (0..10)
                .map(|i| item(&format!("Item {i}"), &format!("https://example.com/{i}"), None))
                .collect(),
        );

        let xml = render_category_feed(&config, &categories.categories[0], now()).unwrap();

        assert_eq!(xml.matches("<item>").count(), 3);
        assert!(xml.contains("Item 2"));
        assert!(!xml.contains("Item 3"));
    }

    #[test]
    fn test_control_characters_are_dropped() {
        assert_eq!(xml_safe("a\u{1}b\tc\nd"), "ab\tc\nd");
    }

    #[tokio::test]
    async fn test_write_feeds_skips_empty_categories() {
        let dir = tempfile::tempdir().unwrap();
        let config = RssConfig {
            output_dir: dir.path().to_string_lossy().into_owned(),
            ..config()
        };
        let mut categories = CategoryResult::default();
        categories.push("tech", vec![item("A", "https://example.com/a", None)]);
        categories.push("finance", vec![]);
        let all = categories.flatten();

        let written = write_feeds(&config, &categories, &all, now()).await.unwrap();

        assert_eq!(written.len(), 2);
        assert!(dir.path().join("tech.xml").exists());
        assert!(dir.path().join("all.xml").exists());
        assert!(!dir.path().join("finance.xml").exists());
    }

    #[tokio::test]
    async fn test_category_named_all_keeps_its_own_feed() {
        let dir = tempfile::tempdir().unwrap();
        let config = RssConfig {
            output_dir: dir.path().to_string_lossy().into_owned(),
            ..config()
        };
        let mut categories = CategoryResult::default();
        categories.push("all", vec![item("Only here", "https://example.com/a", None)]);
        categories.push("C", vec![item("From C", "https://example.com/c", None)]);
        categories.push("C++", vec![item("From C++", "https://example.com/cpp", None)]);
        let all = categories.flatten();

        let written = write_feeds(&config, &categories, &all, now()).await.unwrap();

        assert_eq!(written.len(), 4);
        let own = std::fs::read_to_string(dir.path().join("all-2.xml")).unwrap();
        assert!(own.contains("<category>all</category>"));
        let combined = std::fs::read_to_string(dir.path().join("all.xml")).unwrap();
        assert!(combined.contains("<title>News Aggregator - All</title>"));
        assert!(std::fs::read_to_string(dir.path().join("c.xml")).unwrap().contains("From C<"));
        assert!(std::fs::read_to_string(dir.path().join("c-2.xml")).unwrap().contains("From C++"));
    }
}
