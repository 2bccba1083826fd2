//! Incremental per-(symbol, timeframe) bar cache.
//!
//! Lookup order: run-scoped memory, then disk, then the upstream source for
//! the gap since the last cached bar. Availability wins over freshness: when
//! the source fails, whatever was cached is returned, marked stale.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{merge_bars, CachedSeries, DataSource, MemoryCache, SeriesStore, Timeframe};

/// Incremental series cache. Never returns an error.
pub struct SeriesCache {
    source: Arc<dyn DataSource>,
    store: SeriesStore,
    overlap_days: i64,
    exchange_offset: FixedOffset,
}

impl SeriesCache {
    pub fn new(source: Arc<dyn DataSource>, store: SeriesStore) -> Self {
        Self {
            source,
            store,
            overlap_days: 1,
            exchange_offset: FixedOffset::east_opt(330 * 60).unwrap_or_else(|| Utc.fix()),
        }
    }

    /// Days re-fetched before the last cached bar.
    pub fn with_overlap_days(mut self, days: i64) -> Self {
        self.overlap_days = days.max(0);
        self
    }

    /// Exchange offset used to date daily bars.
    pub fn with_exchange_offset_minutes(mut self, minutes: i32) -> Self {
        if let Some(offset) = FixedOffset::east_opt(minutes * 60) {
            self.exchange_offset = offset;
        }
        self
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    /// Days to request given the last cached bar.
    fn fetch_window(&self, last: Option<DateTime<Utc>>, lookback_days: i64, now: DateTime<Utc>) -> i64 {
        match last {
            None => lookback_days.max(1),
            Some(last) => {
                let gap_days = now.signed_duration_since(last).num_days().max(0);
                (gap_days + self.overlap_days).max(1)
            }
        }
    }

    /// Fetch the merged series for `symbol` as of now.
    pub async fn fetch(
        &self,
        memory: &MemoryCache,
        symbol: &str,
        timeframe: Timeframe,
        lookback_days: i64,
    ) -> CachedSeries {
        self.fetch_at(memory, symbol, timeframe, lookback_days, Utc::now())
            .await
    }

    /// Fetch the merged series for `symbol` with an explicit clock.
    pub async fn fetch_at(
        &self,
        memory: &MemoryCache,
        symbol: &str,
        timeframe: Timeframe,
        lookback_days: i64,
        now: DateTime<Utc>,
    ) -> CachedSeries {
        if let Some(hit) = memory.get(symbol, timeframe) {
            debug!(symbol = %symbol, timeframe = %timeframe, "Memory cache hit");
            return hit;
        }

        let cached = self.store.load(symbol, timeframe).unwrap_or_default();
        let window = self.fetch_window(cached.last().map(|b| b.timestamp), lookback_days, now);

        let fresh = match self.source.get_bars(symbol, timeframe, window).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    timeframe = %timeframe,
                    source = self.source.name(),
                    cached_bars = cached.len(),
                    error = %e,
                    "Fetch failed, serving cached series"
                );
                return memory.insert(symbol, timeframe, cached, false);
            }
        };

        let merged = merge_bars(&cached, &fresh, timeframe, self.exchange_offset);
        info!(
            symbol = %symbol,
            timeframe = %timeframe,
            window_days = window,
            cached = cached.len(),
            fetched = fresh.len(),
            merged = merged.len(),
            "Series updated"
        );

        if let Err(e) = self.store.save(symbol, timeframe, &merged) {
            warn!(symbol = %symbol, timeframe = %timeframe, error = %e, "Failed to persist series");
        }

        memory.insert(symbol, timeframe, merged, true)
    }
}
