//! Error types for each stage of the pipeline.
//!
//! Only [`ConfigError`] is ever fatal. Fetch and extraction errors are
//! recorded and logged at the smallest scope they affect, and output errors
//! are reported after the pipeline result already exists.

use std::path::PathBuf;
use thiserror::Error;

/// Problems loading or validating the YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A single failed HTTP attempt. Retried by the fetch engine, never surfaced
/// past it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP session unavailable: {0}")]
    Session(String),

    #[error("fetch cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Failure while turning one candidate element into an item.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("cannot resolve link `{link}`: {source}")]
    Url {
        link: String,
        source: url::ParseError,
    },
}

/// Failures writing RSS, HTML, snapshot or stats files.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("invalid UTF-8 in generated document: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
