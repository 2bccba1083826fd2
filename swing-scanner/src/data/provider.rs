//! Upstream market data abstraction.
//!
//! A `DataSource` is a broker or vendor feed. Implementations report session
//! expiry and rate limiting as distinct errors so [`super::ResilientSource`]
//! can refresh the session or back off instead of giving up.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use super::{Bar, Quote, Timeframe};

// ============================================================================
// Source Error
// ============================================================================

/// Errors reported by a data source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Session token rejected; a re-login may fix it
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Too many requests
    #[error("Rate limited{}", retry_suffix(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// Connection failed or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Nothing available for the requested symbol/timeframe
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Malformed request (unknown symbol format, bad window)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Anything else the feed reports
    #[error("Internal error: {0}")]
    Internal(String),
}

fn retry_suffix(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry after {secs} seconds"),
        None => String::new(),
    }
}

impl SourceError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if this error should trigger a failover to a secondary source
    pub fn should_failover(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::SessionExpired(_) | Self::RateLimited { .. } | Self::Internal(_)
        )
    }
}

// ============================================================================
// Data Source Trait
// ============================================================================

/// A feed of bars and quotes.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Source name for logging (e.g., "rest", "mock")
    fn name(&self) -> &str;

    /// Bars for `symbol` covering the last `lookback_days` days, oldest first.
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback_days: i64,
    ) -> Result<Vec<Bar>, SourceError>;

    /// Latest quotes keyed by symbol. Symbols the feed does not know are omitted.
    async fn get_latest_quotes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Quote>, SourceError>;

    /// Open a fresh session. Sources without sessions succeed trivially.
    async fn reauthenticate(&self) -> Result<(), SourceError> {
        Ok(())
    }
}
