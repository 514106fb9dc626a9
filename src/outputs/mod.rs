//! Renderers for a finished run.
//!
//! # Submodules
//!
//! - [`rss`]: RSS 2.0 feed per category plus `all.xml`
//! - [`html`]: static pages (`index.html`, per-category pages, `feeds.html`)
//! - [`json`]: raw snapshot, `latest.json` and `stats.json` in the data dir
//!
//! # Output Structure
//!
//! ```text
//! rss/            # rss.output_dir
//! ├── tech.xml
//! └── all.xml
//! docs/           # html.output_dir
//! ├── index.html
//! ├── tech.html
//! └── feeds.html
//! data/           # storage.data_dir
//! ├── news_data_20250506_120000.json
//! ├── latest.json
//! └── stats.json
//! ```
//!
//! Every renderer reads the run result and never changes it; a failed
//! renderer is logged by the caller and the others still run.

pub mod html;
pub mod json;
pub mod rss;
