//! Retry, session refresh and failover around a primary data source.
//!
//! Every call takes a rate limiter token. A `SessionExpired` error triggers
//! one re-authentication and one retry; `RateLimited` backs off linearly
//! (step × retry, never less than the server's `Retry-After`) for up to
//! `max_retries` retries. If the primary still fails with a failover-worthy
//! error, the secondary source (if any) is tried once.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{Bar, DataSource, Quote, SharedRateLimiter, SourceError, Timeframe};

// ============================================================================
// Retry Policy
// ============================================================================

/// Backoff policy for rate-limited requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first rate-limited attempt; the request is made at
    /// most `max_retries + 1` times
    pub max_retries: u32,
    /// Retry N waits `N * backoff_step`
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Linear delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_step * retry
    }

    /// Delay before retry number `retry`, raised to the server's
    /// `Retry-After` when that is longer.
    pub fn wait(&self, retry: u32, retry_after_secs: Option<u64>) -> Duration {
        let backoff = self.backoff(retry);
        match retry_after_secs {
            Some(secs) => backoff.max(Duration::from_secs(secs)),
            None => backoff,
        }
    }
}

// ============================================================================
// Resilient Source
// ============================================================================

/// `DataSource` decorator adding rate limiting, retries and failover.
pub struct ResilientSource {
    primary: Arc<dyn DataSource>,
    secondary: Option<Arc<dyn DataSource>>,
    limiter: SharedRateLimiter,
    policy: RetryPolicy,
}

impl ResilientSource {
    pub fn new(primary: Arc<dyn DataSource>, limiter: SharedRateLimiter) -> Self {
        Self {
            primary,
            secondary: None,
            limiter,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn DataSource>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run `call` against `source` with re-auth-once and rate-limit backoff.
    async fn call_with_retry<T, F, Fut>(
        &self,
        source: &Arc<dyn DataSource>,
        what: &str,
        call: F,
    ) -> Result<T, SourceError>
    where
        F: Fn(Arc<dyn DataSource>) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut retries = 0u32;
        let mut reauthenticated = false;

        loop {
            self.limiter.acquire().await;

            match call(Arc::clone(source)).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_session_expired() && !reauthenticated => {
                    // the retry after a re-login does not count against the backoff budget
                    reauthenticated = true;
                    info!(source = source.name(), request = %what, "Session expired, re-authenticating");
                    source.reauthenticate().await?;
                }
                Err(SourceError::RateLimited { retry_after_secs }) if retries < self.policy.max_retries => {
                    retries += 1;
                    let wait = self.policy.wait(retries, retry_after_secs);
                    warn!(
                        source = source.name(),
                        request = %what,
                        retry = retries,
                        retry_after_secs,
                        wait_secs = wait.as_secs_f64(),
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Primary with retries, then the secondary once on a failover-worthy error.
    async fn route<T, F, Fut>(&self, what: &str, call: F) -> Result<T, SourceError>
    where
        F: Fn(Arc<dyn DataSource>) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        match self.call_with_retry(&self.primary, what, &call).await {
            Ok(value) => Ok(value),
            Err(e) => match &self.secondary {
                Some(secondary) if e.should_failover() => {
                    warn!(
                        primary = self.primary.name(),
                        secondary = secondary.name(),
                        request = %what,
                        error = %e,
                        "Primary failed, failing over"
                    );
                    self.call_with_retry(secondary, what, &call).await
                }
                _ => Err(e),
            },
        }
    }
}

#[async_trait]
impl DataSource for ResilientSource {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback_days: i64,
    ) -> Result<Vec<Bar>, SourceError> {
        let what = format!("bars {symbol} {timeframe}");
        self.route(&what, |source| {
            let symbol = symbol.to_string();
            async move { source.get_bars(&symbol, timeframe, lookback_days).await }
        })
        .await
    }

    async fn get_latest_quotes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Quote>, SourceError> {
        let what = format!("quotes x{}", symbols.len());
        self.route(&what, |source| {
            let symbols = symbols.to_vec();
            async move { source.get_latest_quotes(&symbols).await }
        })
        .await
    }

    async fn reauthenticate(&self) -> Result<(), SourceError> {
        self.primary.reauthenticate().await
    }
}
