//! Run-scoped in-memory bar cache.
//!
//! One `MemoryCache` is created per scan and handed to the orchestrator. It
//! has no TTL: within a run, a (symbol, timeframe) is fetched at most once.
//! Each entry remembers whether it came from this run's fetch or was served
//! from disk after the fetch failed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Bar, Timeframe};

/// A cached series and whether this run's fetch produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSeries {
    pub bars: Arc<Vec<Bar>>,
    /// `false` when the upstream fetch failed and the bars are left over
    /// from an earlier run (or empty)
    pub fresh: bool,
}

impl CachedSeries {
    pub fn is_stale(&self) -> bool {
        !self.fresh
    }
}

/// Market data cache keyed by (symbol, timeframe)
#[derive(Debug, Default)]
pub struct MemoryCache {
    series: RwLock<HashMap<(String, Timeframe), CachedSeries>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached series, if any
    pub fn get(&self, symbol: &str, timeframe: Timeframe) -> Option<CachedSeries> {
        let cache = self.series.read().ok()?;
        cache.get(&(symbol.to_string(), timeframe)).cloned()
    }

    /// Store a series and return the shared entry.
    pub fn insert(&self, symbol: &str, timeframe: Timeframe, bars: Vec<Bar>, fresh: bool) -> CachedSeries {
        let entry = CachedSeries {
            bars: Arc::new(bars),
            fresh,
        };
        if let Ok(mut cache) = self.series.write() {
            cache.insert((symbol.to_string(), timeframe), entry.clone());
        }
        entry
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let Ok(cache) = self.series.read() else {
            return CacheStats::default();
        };
        CacheStats {
            entries: cache.len(),
            empty_entries: cache.values().filter(|e| e.bars.is_empty()).count(),
            stale_entries: cache.values().filter(|e| e.is_stale()).count(),
            total_bars: cache.values().map(|e| e.bars.len()).sum(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    /// Entries cached after an upstream failure with nothing on disk
    pub empty_entries: usize,
    /// Entries served from disk after an upstream failure
    pub stale_entries: usize,
    pub total_bars: usize,
}
