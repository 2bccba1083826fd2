//! Market data for the swing scanner.
//!
//! Bars arrive from a [`DataSource`], pass through the [`ResilientSource`]
//! (rate limiting, session refresh, backoff, failover) and are kept in a
//! two-layer cache: the run-scoped [`MemoryCache`] and the on-disk
//! [`SeriesStore`], stitched together by [`SeriesCache`].
//!
//! # Layout under `cache_dir`
//! - `raw/{symbol}_{tf}.json` - one merged series per (symbol, timeframe)
//! - `snapshot_{tf}.json` - per-timeframe union published by [`SnapshotPublisher`]

mod cache;
mod http_source;
mod merge;
mod provider;
mod rate_limiter;
mod resilient;
mod series_cache;
mod snapshot;
mod store;

pub use cache::{CacheStats, CachedSeries, MemoryCache};
pub use http_source::{RestSource, RestSourceConfig};
pub use merge::{merge_bars, normalize_timestamp};
pub use provider::{DataSource, SourceError};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};
pub use resilient::{ResilientSource, RetryPolicy};
pub use series_cache::SeriesCache;
pub use snapshot::{Snapshot, SnapshotPublisher};
pub use store::SeriesStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// Bar interval used by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// 15-minute bars
    #[serde(rename = "15m")]
    M15,
    /// 1-hour bars
    #[serde(rename = "1h")]
    H1,
    /// Daily bars
    #[serde(rename = "1d")]
    Daily,
}

impl Timeframe {
    /// All timeframes, finest first.
    pub const ALL: [Timeframe; 3] = [Timeframe::M15, Timeframe::H1, Timeframe::Daily];

    /// Short code used in file names and API calls.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::Daily => "1d",
        }
    }

    /// Minutes per bar
    pub fn minutes(&self) -> u32 {
        match self {
            Self::M15 => 15,
            Self::H1 => 60,
            Self::Daily => 24 * 60,
        }
    }

    pub fn is_intraday(&self) -> bool {
        !matches!(self, Self::Daily)
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time (UTC)
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Close above open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Close below open
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// All price and volume fields are finite.
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Latest quote snapshot for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    /// Last traded price
    pub last: f64,
    /// Previous session close
    pub prev_close: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Percent change versus the previous close.
    pub fn change_percent(&self) -> f64 {
        if self.prev_close == 0.0 {
            0.0
        } else {
            (self.last - self.prev_close) / self.prev_close * 100.0
        }
    }
}
