//! HTTP access and sleeping, behind traits so the fetch engine can be tested
//! without a network or a wall clock.
//!
//! # Architecture
//!
//! - [`HttpGet`]: core trait, one GET returning the body of a 200 response
//! - [`HttpSession`]: `reqwest`-backed implementation owning the run's
//!   connection pool
//! - [`Sleeper`] / [`TokioSleeper`]: the only way the fetch engine waits
//!
//! # Session lifetime
//!
//! The `reqwest::Client` is built lazily on the first request and dropped
//! exactly once, either by [`HttpSession::close`] or when the session goes
//! out of scope. If it cannot be built, every request of the run fails with
//! [`FetchError::Session`] and the fetch engine records the sources as failed.

use crate::error::FetchError;
use reqwest::{Client, StatusCode};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Trait for fetching a page body.
///
/// Implementors return `Ok(body)` only for a successful (200) response; any
/// other status or transport problem is an error the caller may retry.
///
/// Futures are awaited on the calling task, so no `Send` bound is required.
#[allow(async_fn_in_trait)]
pub trait HttpGet {
    async fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// Trait for waiting between attempts and requests.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Settings applied to every request of the session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Total time allowed for one request, body included.
    pub timeout: Duration,
    pub user_agent: String,
}

/// Shared `reqwest` session for one run.
pub struct HttpSession {
    settings: SessionSettings,
    client: OnceLock<Result<Client, String>>,
}

impl HttpSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&Client, FetchError> {
        self.client
            .get_or_init(|| {
                let built = Client::builder()
                    .timeout(self.settings.timeout)
                    .user_agent(self.settings.user_agent.clone())
                    .build();
                match built {
                    Ok(client) => {
                        info!(timeout = ?self.settings.timeout, "HTTP session created");
                        Ok(client)
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to create HTTP session; all fetches will fail");
                        Err(e.to_string())
                    }
                }
            })
            .as_ref()
            .map_err(|reason| FetchError::Session(reason.clone()))
    }

    /// Release the underlying client. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(Ok(_)) = self.client.take() {
            info!("HTTP session closed");
        }
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSession")
            .field("settings", &self.settings)
            .field("open", &matches!(self.client.get(), Some(Ok(_))))
            .finish()
    }
}

impl HttpGet for HttpSession {
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let client = self.client()?;
        let t0 = Instant::now();
        let response = client.get(url).send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            warn!(%url, status = status.as_u16(), "Non-200 response");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        debug!(
            %url,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SessionSettings {
        SessionSettings {
            timeout: Duration::from_secs(5),
            user_agent: "news_aggregator-test".to_string(),
        }
    }

    #[test]
    fn test_session_is_lazy() {
        let session = HttpSession::new(settings());
        assert!(session.client.get().is_none());
        assert!(format!("{session:?}").contains("open: false"));
    }

    #[test]
    fn test_session_close_is_idempotent() {
        let mut session = HttpSession::new(settings());
        session.client().unwrap();
        assert!(session.client.get().is_some());
        session.close();
        assert!(session.client.get().is_none());
        session.close();
    }

    #[tokio::test]
    async fn test_invalid_url_is_transport_error() {
        let session = HttpSession::new(settings());
        let err = session.get("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
