//! Static HTML site: `index.html`, one page per category and `feeds.html`.
//!
//! Pages are built as strings; every piece of scraped text goes through
//! `html_escape` before it lands in markup. Links to feeds use the RSS
//! `base_url` when set, otherwise a path relative to a sibling RSS directory.

use crate::config::{HtmlConfig, RssConfig, Theme};
use crate::error::OutputError;
use crate::models::{CategoryItems, CategoryResult, Item, RunStats};
use crate::outputs::rss::{feed_file_name, feed_url};
use crate::utils::upcase;
use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

const MODERN_CSS: &str = r#"
body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; background: #f4f5fb; color: #212529; margin: 0; padding: 24px; line-height: 1.6; }
.container { max-width: 1100px; margin: 0 auto; background: #fff; border-radius: 12px; overflow: hidden; box-shadow: 0 12px 40px rgba(0,0,0,.08); }
.header { background: linear-gradient(135deg, #667eea, #764ba2); color: #fff; padding: 28px; text-align: center; }
.header h1 { margin: 0; font-size: 30px; }
.header p { margin: 8px 0 0; opacity: .9; font-size: 14px; }
.nav { display: flex; flex-wrap: wrap; gap: 8px; padding: 14px 28px; background: #f8f9fa; border-bottom: 1px solid #e9ecef; }
.nav a { color: #667eea; text-decoration: none; padding: 6px 14px; border: 1px solid #e9ecef; border-radius: 16px; font-size: 14px; }
.nav a.active, .nav a:hover { background: #667eea; color: #fff; }
.stats { display: flex; flex-wrap: wrap; gap: 16px; padding: 18px 28px; border-bottom: 1px solid #e9ecef; }
.stat { flex: 1; min-width: 120px; text-align: center; }
.stat-value { display: block; font-size: 24px; font-weight: 700; color: #667eea; }
.stat-label { display: block; font-size: 12px; color: #6c757d; text-transform: uppercase; }
.category { padding: 24px 28px; border-bottom: 1px solid #e9ecef; }
.category h2 { margin: 0 0 16px; font-size: 22px; }
.category h2 a.feed { font-size: 13px; font-weight: 400; margin-left: 8px; color: #fd7e14; }
.item { padding: 12px 16px; margin-bottom: 10px; border-left: 4px solid #667eea; background: #fafbff; border-radius: 6px; }
.item-title a { color: #212529; font-weight: 600; text-decoration: none; }
.item-title a:hover { color: #667eea; }
.item-meta { font-size: 12px; color: #6c757d; }
.item-description { font-size: 14px; color: #495057; margin-top: 4px; }
.empty { color: #6c757d; font-style: italic; }
.feeds li { margin-bottom: 8px; }
.footer { text-align: center; color: #868e96; font-size: 12px; padding: 20px; }
"#;

const DARK_CSS: &str = r#"
body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; background: #1a1a1a; color: #e0e0e0; margin: 0; padding: 24px; line-height: 1.6; }
.container { max-width: 1100px; margin: 0 auto; }
.header { background: #2d2d2d; padding: 24px; border-radius: 8px; text-align: center; margin-bottom: 16px; }
.header h1 { margin: 0; color: #fff; }
.header p { margin: 6px 0 0; color: #aaa; }
.nav { display: flex; flex-wrap: wrap; gap: 8px; background: #2d2d2d; padding: 14px; border-radius: 8px; margin-bottom: 16px; }
.nav a { color: #4a9eff; text-decoration: none; padding: 6px 14px; background: #3d3d3d; border-radius: 5px; }
.nav a.active, .nav a:hover { background: #4d4d4d; }
.stats { display: flex; flex-wrap: wrap; gap: 16px; background: #2d2d2d; padding: 16px; border-radius: 8px; margin-bottom: 16px; }
.stat { flex: 1; min-width: 120px; text-align: center; }
.stat-value { display: block; font-size: 24px; font-weight: 700; color: #4a9eff; }
.stat-label { display: block; font-size: 12px; color: #aaa; }
.category { background: #2d2d2d; padding: 20px; border-radius: 8px; margin-bottom: 16px; }
.category h2 { margin: 0 0 14px; color: #fff; border-bottom: 2px solid #4a9eff; padding-bottom: 8px; }
.category h2 a.feed { font-size: 13px; font-weight: 400; margin-left: 8px; color: #ffa94d; }
.item { background: #3d3d3d; padding: 12px 16px; border-radius: 6px; margin-bottom: 10px; border-left: 4px solid #4a9eff; }
.item-title a { color: #fff; font-weight: 600; text-decoration: none; }
.item-title a:hover { color: #4a9eff; }
.item-meta { font-size: 12px; color: #aaa; }
.item-description { font-size: 14px; color: #ccc; margin-top: 4px; }
.empty { color: #888; font-style: italic; }
.feeds li { margin-bottom: 8px; }
.feeds a { color: #4a9eff; }
.footer { text-align: center; color: #666; font-size: 12px; padding: 20px; }
"#;

fn stylesheet(theme: Theme) -> &'static str {
    match theme {
        Theme::Modern => MODERN_CSS,
        Theme::Dark => DARK_CSS,
    }
}

/// File name of the page with stem `slug`.
pub fn page_file_name(slug: &str) -> String {
    format!("{slug}.html")
}

fn feed_href(rss: &RssConfig, slug: &str) -> String {
    if rss.base_url.is_empty() {
        format!("../{}/{}", rss.output_dir.trim_matches('/'), feed_file_name(slug))
    } else {
        feed_url(rss, slug)
    }
}

/// Human-readable time of an item, falling back to the raw text.
fn display_time(item: &Item) -> String {
    match item.published() {
        Some(published) => published.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => item.published_at.clone().unwrap_or_default(),
    }
}

/// Shared page chrome around `body`.
struct Layout<'a> {
    html: &'a HtmlConfig,
    categories: &'a CategoryResult,
    now: DateTime<Utc>,
}

impl Layout<'_> {
    fn page(&self, heading: &str, active: Option<&str>, body: &str) -> Result<String, OutputError> {
        let mut out = String::new();
        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html lang=\"en\">")?;
        writeln!(out, "<head>")?;
        writeln!(out, "<meta charset=\"utf-8\">")?;
        writeln!(out, "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">")?;
        writeln!(out, "<title>{} - {}</title>", text(heading), text(&self.html.title))?;
        writeln!(out, "<style>{}</style>", stylesheet(self.html.theme))?;
        writeln!(out, "</head>")?;
        writeln!(out, "<body>")?;
        writeln!(out, "<div class=\"container\">")?;
        writeln!(out, "<div class=\"header\">")?;
        writeln!(out, "<h1>{}</h1>", text(&self.html.title))?;
        writeln!(out, "<p>Updated {}</p>", self.now.format("%Y-%m-%d %H:%M UTC"))?;
        writeln!(out, "</div>")?;

        writeln!(out, "<div class=\"nav\">")?;
        let class = |name: &str| if active == Some(name) { " class=\"active\"" } else { "" };
        writeln!(out, "<a href=\"index.html\"{}>Home</a>", class("index"))?;
        for category in self.categories.iter() {
            writeln!(
                out,
                "<a href=\"{}\"{}>{}</a>",
                attr(&page_file_name(&category.slug)),
                class(&category.slug),
                text(&upcase(&category.name))
            )?;
        }
        writeln!(out, "<a href=\"feeds.html\"{}>RSS</a>", class("feeds"))?;
        writeln!(out, "</div>")?;

        out.push_str(body);

        writeln!(out, "<div class=\"footer\">Generated by {} at {}</div>", env!("CARGO_PKG_NAME"), self.now.to_rfc3339())?;
        writeln!(out, "</div>")?;
        writeln!(out, "</body>")?;
        writeln!(out, "</html>")?;
        Ok(out)
    }
}

fn write_item(out: &mut String, item: &Item) -> Result<(), OutputError> {
    writeln!(out, "<div class=\"item\">")?;
    writeln!(
        out,
        "<div class=\"item-title\"><a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a></div>",
        attr(&item.link),
        text(&item.title)
    )?;
    writeln!(
        out,
        "<div class=\"item-meta\">{} &middot; {}</div>",
        text(&item.source_name),
        text(&display_time(item))
    )?;
    if item.description != item.title {
        writeln!(out, "<div class=\"item-description\">{}</div>", text(&item.description))?;
    }
    writeln!(out, "</div>")?;
    Ok(())
}

fn write_category_section(
    out: &mut String,
    rss: &RssConfig,
    category: &CategoryItems,
    limit: usize,
) -> Result<(), OutputError> {
    writeln!(out, "<div class=\"category\">")?;
    writeln!(
        out,
        "<h2>{} <a class=\"feed\" href=\"{}\">RSS</a></h2>",
        text(&upcase(&category.name)),
        attr(&feed_href(rss, &category.slug))
    )?;
    if category.items.is_empty() {
        writeln!(out, "<p class=\"empty\">No news in this category right now.</p>")?;
    }
    for item in category.items.iter().take(limit) {
        write_item(out, item)?;
    }
    writeln!(out, "</div>")?;
    Ok(())
}

/// Front page: run stats, then every category with its top items.
pub fn render_index(
    html: &HtmlConfig,
    rss: &RssConfig,
    categories: &CategoryResult,
    stats: &RunStats,
    now: DateTime<Utc>,
) -> Result<String, OutputError> {
    let mut body = String::new();
    writeln!(body, "<div class=\"stats\">")?;
    for (value, label) in [
        (stats.total_items.to_string(), "Items"),
        (categories.categories.len().to_string(), "Categories"),
        (format!("{}/{}", stats.successful_sources, stats.total_sources), "Sources OK"),
    ] {
        writeln!(
            body,
            "<div class=\"stat\"><span class=\"stat-value\">{value}</span><span class=\"stat-label\">{label}</span></div>"
        )?;
    }
    writeln!(body, "</div>")?;

    for category in categories.iter() {
        write_category_section(&mut body, rss, category, html.max_items_per_category)?;
    }

    Layout { html, categories, now }.page("Home", Some("index"), &body)
}

/// Page listing every item of one category.
pub fn render_category_page(
    html: &HtmlConfig,
    rss: &RssConfig,
    categories: &CategoryResult,
    category: &CategoryItems,
    now: DateTime<Utc>,
) -> Result<String, OutputError> {
    let mut body = String::new();
    write_category_section(&mut body, rss, category, usize::MAX)?;
    Layout { html, categories, now }.page(&upcase(&category.name), Some(category.slug.as_str()), &body)
}

/// Page listing the RSS feed of every non-empty category plus the combined feed.
pub fn render_feeds_page(
    html: &HtmlConfig,
    rss: &RssConfig,
    categories: &CategoryResult,
    now: DateTime<Utc>,
) -> Result<String, OutputError> {
    let mut body = String::new();
    writeln!(body, "<div class=\"category\">")?;
    writeln!(body, "<h2>RSS feeds</h2>")?;
    writeln!(body, "<ul class=\"feeds\">")?;
    writeln!(
        body,
        "<li><a href=\"{}\">All categories</a></li>",
        attr(&feed_href(rss, "all"))
    )?;
    for category in categories.iter().filter(|c| !c.items.is_empty()) {
        writeln!(
            body,
            "<li><a href=\"{}\">{}</a> ({} items)</li>",
            attr(&feed_href(rss, &category.slug)),
            text(&upcase(&category.name)),
            category.items.len()
        )?;
    }
    writeln!(body, "</ul>")?;
    writeln!(body, "</div>")?;
    Layout { html, categories, now }.page("RSS feeds", Some("feeds"), &body)
}

async fn write_page(dir: &Path, name: String, page: String) -> Result<PathBuf, OutputError> {
    let path = dir.join(name);
    fs::write(&path, page).await?;
    info!(path = %path.display(), "Wrote HTML page");
    Ok(path)
}

/// Write the whole site into `html.output_dir`. Returns the written paths.
#[instrument(level = "info", skip_all, fields(output_dir = %html.output_dir))]
pub async fn write_site(
    html: &HtmlConfig,
    rss: &RssConfig,
    categories: &CategoryResult,
    stats: &RunStats,
    now: DateTime<Utc>,
) -> Result<Vec<PathBuf>, OutputError> {
    let dir = Path::new(&html.output_dir);
    fs::create_dir_all(dir).await?;

    let mut written = Vec::new();
    let index = render_index(html, rss, categories, stats, now)?;
    written.push(write_page(dir, "index.html".to_string(), index).await?);

    for category in categories.iter() {
        let page = render_category_page(html, rss, categories, category, now)?;
        written.push(write_page(dir, page_file_name(&category.slug), page).await?);
    }

    let feeds = render_feeds_page(html, rss, categories, now)?;
    written.push(write_page(dir, "feeds.html".to_string(), feeds).await?);

    info!(pages = written.len(), "HTML generation complete");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    fn item(title: &str, link: &str) -> Item {
        Item {
            id: Item::generate_id("Wire", link, title),
            title: title.to_string(),
            link: link.to_string(),
            description: format!("{title} in detail"),
            source_name: "Wire".to_string(),
            category: "tech".to_string(),
            published_at: Some("2025-05-06T10:30:00Z".to_string()),
            fetched_at: now(),
        }
    }

    fn categories() -> CategoryResult {
        let mut result = CategoryResult::default();
        result.push(
            "tech",
            vec![item("<script>alert(1)</script>", "https://example.com/a?x=1&y=\"2\""), item("Second", "https://example.com/b")],
        );
        result.push("finance", vec![]);
        result
    }

    #[test]
    fn test_index_escapes_scraped_text() {
        let page = render_index(&HtmlConfig::default(), &RssConfig::default(), &categories(), &RunStats::default(), now()).unwrap();

        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(page.contains("href=\"https://example.com/a?x=1&amp;y=&quot;2&quot;\""));
        assert!(page.contains("2025-05-06 10:30 UTC"));
        assert!(page.contains("No news in this category right now."));
    }

    #[test]
    fn test_index_respects_item_limit() {
        let html = HtmlConfig {
            max_items_per_category: 1,
            ..HtmlConfig::default()
        };
        let page = render_index(&html, &RssConfig::default(), &categories(), &RunStats::default(), now()).unwrap();
        assert_eq!(page.matches("class=\"item\"").count(), 1);

        let tech = &categories().categories[0];
        let full = render_category_page(&html, &RssConfig::default(), &categories(), tech, now()).unwrap();
        assert_eq!(full.matches("class=\"item\"").count(), 2);
    }

    #[test]
    fn test_theme_switches_stylesheet() {
        let dark = HtmlConfig {
            theme: Theme::Dark,
            ..HtmlConfig::default()
        };
        let page = render_index(&dark, &RssConfig::default(), &categories(), &RunStats::default(), now()).unwrap();
        assert!(page.contains("background: #1a1a1a"));

        let page = render_index(&HtmlConfig::default(), &RssConfig::default(), &categories(), &RunStats::default(), now()).unwrap();
        assert!(page.contains("#667eea"));
    }

    #[test]
    fn test_feeds_page_links() {
        let rss = RssConfig {
            base_url: "https://feeds.example.com".to_string(),
            ..RssConfig::default()
        };
        let page = render_feeds_page(&HtmlConfig::default(), &rss, &categories(), now()).unwrap();

        assert!(page.contains("href=\"https://feeds.example.com/all.xml\""));
        assert!(page.contains("href=\"https://feeds.example.com/tech.xml\""));
        assert!(!page.contains("finance.xml"));

        let relative = render_feeds_page(&HtmlConfig::default(), &RssConfig::default(), &categories(), now()).unwrap();
        assert!(relative.contains("href=\"../rss/all.xml\""));
    }

    #[tokio::test]
    async fn test_write_site_creates_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let html = HtmlConfig {
            output_dir: dir.path().join("docs").to_string_lossy().into_owned(),
            ..HtmlConfig::default()
        };

        let written = write_site(&html, &RssConfig::default(), &categories(), &RunStats::default(), now()).await.unwrap();

        assert_eq!(written.len(), 4);
        for name in ["index.html", "tech.html", "finance.html", "feeds.html"] {
            assert!(dir.path().join("docs").join(name).exists(), "{name} missing");
        }
    }

    #[tokio::test]
    async fn test_category_pages_never_replace_site_pages() {
        let dir = tempfile::tempdir().unwrap();
        let html = HtmlConfig {
            output_dir: dir.path().to_string_lossy().into_owned(),
            ..HtmlConfig::default()
        };
        let mut categories = CategoryResult::default();
        categories.push("index", vec![item("Indexed", "https://example.com/i")]);
        categories.push("feeds", vec![]);

        let written = write_site(&html, &RssConfig::default(), &categories, &RunStats::default(), now()).await.unwrap();

        assert_eq!(written.len(), 4);
        let home = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert!(home.contains("<a href=\"index.html\" class=\"active\">Home</a>"));
        assert!(home.contains("<a href=\"index-2.html\">Index</a>"));
        assert!(home.contains("href=\"../rss/index-2.xml\""));
        let own = std::fs::read_to_string(dir.path().join("index-2.html")).unwrap();
        assert!(own.contains("<a href=\"index-2.html\" class=\"active\">Index</a>"));
        let feeds = std::fs::read_to_string(dir.path().join("feeds.html")).unwrap();
        assert!(feeds.contains("<h2>RSS feeds</h2>"));
        assert!(dir.path().join("feeds-2.html").exists());
    }
}
