//! Fetch engine: concurrent retrieval of every configured source.
//!
//! # Retry Strategy
//!
//! Each source gets one initial attempt plus up to `max_retries` retries.
//! The wait before retry `n` (0-indexed) is `retry_base * 2^n`, so with the
//! default one-second base the waits are 1s, 2s, 4s. A source that never
//! answers with a 200 yields a [`FetchRecord`] with `success == false`; the
//! engine never returns an error to its caller.
//!
//! # Pacing
//!
//! After a successful fetch the task sleeps the inter-request delay (global,
//! or the source's own `fetch_delay`) before handing back its record. The
//! delay holds only that task; sibling fetches keep running.
//!
//! # Concurrency
//!
//! Sources of one category are fetched through
//! `futures::stream::buffer_unordered`, capped at `max_workers`. Categories
//! are fetched one after another in configuration order. Records are
//! returned in source order regardless of completion order.

use crate::client::{HttpGet, HttpSession, SessionSettings, Sleeper, TokioSleeper};
use crate::error::FetchError;
use crate::models::{FetchRecord, Source, SourceRegistry};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; news_aggregator/0.1; +https://github.com/news-aggregator)";

/// Tunables for the fetch engine.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub request_delay: Duration,
    pub max_workers: usize,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base: Duration::from_secs(1),
            request_delay: Duration::from_secs(2),
            max_workers: DEFAULT_WORKERS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchSettings {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Wait before retry `retry` (0-indexed): `base * 2^retry`.
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(1u32.checked_shl(retry).unwrap_or(u32::MAX))
}

/// Sending half of a run-wide cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving half of a run-wide cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, signal) = Self::pair();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pending forever if the
    /// handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Summary of one `fetch_all` pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchStats {
    pub timestamp: DateTime<Utc>,
    pub total_categories: usize,
    pub total_sources: usize,
    pub successful_sources: usize,
    pub elapsed_secs: f64,
}

/// Records of one `fetch_all` pass, grouped by category in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub categories: Vec<(String, Vec<FetchRecord>)>,
    pub stats: FetchStats,
}

/// Concurrent, retrying fetcher over an [`HttpGet`] client.
pub struct FetchEngine<C = HttpSession, S = TokioSleeper> {
    client: C,
    sleeper: S,
    settings: FetchSettings,
    cancel: CancelSignal,
}

impl FetchEngine<HttpSession, TokioSleeper> {
    /// Engine over a lazily created `reqwest` session.
    pub fn new(settings: FetchSettings) -> Self {
        let session = HttpSession::new(settings.session_settings());
        Self::with_parts(session, TokioSleeper, settings)
    }

    /// Close the HTTP session. Dropping the engine has the same effect.
    pub fn shutdown(mut self) {
        self.client.close();
    }
}

impl<C, S> FetchEngine<C, S>
where
    C: HttpGet,
    S: Sleeper,
{
    pub fn with_parts(client: C, sleeper: S, settings: FetchSettings) -> Self {
        Self {
            client,
            sleeper,
            settings,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetch one source. Never fails: errors become a `success == false` record.
    #[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.url))]
    pub async fn fetch(&self, source: &Source) -> FetchRecord {
        let result = if self.cancel.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
                result = self.get_with_backoff(&source.url) => result,
            }
        };

        match result {
            Ok(content) => {
                let record = FetchRecord::succeeded(source, content, Utc::now());
                info!(bytes = record.raw_content.len(), "Fetched source");
                self.pace(source).await;
                record
            }
            Err(FetchError::Cancelled) => {
                warn!("Fetch cancelled");
                FetchRecord::failed(source, Utc::now())
            }
            Err(e) => {
                error!(error = %e, "Fetch failed after retries");
                FetchRecord::failed(source, Utc::now())
            }
        }
    }

    /// Hold this task for the source's inter-request delay. Cut short on cancel.
    async fn pace(&self, source: &Source) {
        let delay = source.fetch_delay.unwrap_or(self.settings.request_delay);
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            _ = self.sleeper.sleep(delay) => {}
        }
    }

    async fn get_with_backoff(&self, url: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut retry = 0u32;

        loop {
            let attempt = tokio::time::timeout(self.settings.timeout, self.client.get(url))
                .await
                .unwrap_or(Err(FetchError::Timeout));

            match attempt {
                Ok(body) => return Ok(body),
                Err(e) => {
                    if retry >= self.settings.max_retries {
                        warn!(
                            attempts = retry + 1,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "Exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = backoff_delay(self.settings.retry_base, retry);
                    warn!(
                        retry = retry + 1,
                        max = self.settings.max_retries,
                        ?delay,
                        error = %e,
                        "Attempt failed; backing off"
                    );
                    self.sleeper.sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }

    /// Fetch every enabled source of a category concurrently.
    ///
    /// A panic inside one fetch is contained and recorded as a failure for
    /// that source only.
    #[instrument(level = "info", skip(self, sources))]
    pub async fn fetch_category(&self, category: &str, sources: &[&Source]) -> Vec<FetchRecord> {
        let enabled: Vec<&Source> = sources.iter().copied().filter(|s| s.enabled).collect();
        if enabled.is_empty() {
            warn!("Category has no enabled sources");
            return Vec::new();
        }

        info!(sources = enabled.len(), "Fetching category");

        let mut indexed: Vec<(usize, FetchRecord)> = stream::iter(enabled.iter().enumerate())
            .map(|(idx, source)| async move {
                let record = AssertUnwindSafe(self.fetch(source))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        error!(source = %source.name, "Fetch task panicked");
                        FetchRecord::failed(source, Utc::now())
                    });
                (idx, record)
            })
            .buffer_unordered(self.settings.max_workers.max(1))
            .collect()
            .await;

        indexed.sort_by_key(|(idx, _)| *idx);
        let records: Vec<FetchRecord> = indexed.into_iter().map(|(_, r)| r).collect();

        let ok = records.iter().filter(|r| r.success).count();
        info!(successful = ok, total = records.len(), "Category fetch complete");
        records
    }

    /// Fetch every category of the registry, one category at a time.
    #[instrument(level = "info", skip_all)]
    pub async fn fetch_all(&self, registry: &SourceRegistry) -> FetchOutcome {
        let timestamp = Utc::now();
        let t0 = Instant::now();
        let mut categories = Vec::with_capacity(registry.len());

        for category in registry.categories() {
            let sources = registry.enabled_sources(category);
            let records = self.fetch_category(category, &sources).await;
            categories.push((category.to_string(), records));
        }

        let total_sources = categories.iter().map(|(_, r)| r.len()).sum();
        let successful_sources = categories
            .iter()
            .flat_map(|(_, r)| r.iter())
            .filter(|r| r.success)
            .count();
        let elapsed = t0.elapsed();

        info!(
            categories = categories.len(),
            total_sources,
            successful_sources,
            ?elapsed,
            "Fetch pass complete"
        );
        debug!(cancelled = self.cancel.is_cancelled(), "Fetch pass state");

        FetchOutcome {
            stats: FetchStats {
                timestamp,
                total_categories: categories.len(),
                total_sources,
                successful_sources,
                elapsed_secs: elapsed.as_secs_f64(),
            },
            categories,
        }
    }
}
