//! Failover through the full data path: resilient source into the series cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, DurationRound, Utc};
use tempfile::TempDir;

use swing_scanner::data::{
    shared_limiter, Bar, DataSource, MemoryCache, Quote, ResilientSource, RetryPolicy, SeriesCache, SeriesStore,
    SourceError, Timeframe,
};

/// Hourly feed that can be switched off.
struct SwitchableSource {
    name: &'static str,
    down: AtomicBool,
    calls: AtomicU32,
}

impl SwitchableSource {
    fn new(name: &'static str, down: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            down: AtomicBool::new(down),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for SwitchableSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn get_bars(&self, _symbol: &str, _timeframe: Timeframe, lookback_days: i64) -> Result<Vec<Bar>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(SourceError::Network(format!("{} unreachable", self.name)));
        }

        let last = Utc::now().duration_trunc(ChronoDuration::hours(1)).unwrap();
        let hours = lookback_days * 24;
        Ok((0..hours)
            .map(|i| {
                let ts = last - ChronoDuration::hours(hours - 1 - i);
                Bar::new(ts, 100.0, 101.0, 99.0, 100.5, 1000.0)
            })
            .collect())
    }

    async fn get_latest_quotes(&self, _symbols: &[String]) -> Result<HashMap<String, Quote>, SourceError> {
        Ok(HashMap::new())
    }
}

fn resilient(primary: Arc<SwitchableSource>, secondary: Arc<SwitchableSource>) -> Arc<ResilientSource> {
    Arc::new(
        ResilientSource::new(primary, shared_limiter("test", 100))
            .with_policy(RetryPolicy {
                max_retries: 1,
                backoff_step: Duration::from_millis(1),
            })
            .with_secondary(secondary),
    )
}

#[tokio::test]
async fn test_secondary_fills_cache_when_primary_down() {
    let dir = TempDir::new().unwrap();
    let primary = SwitchableSource::new("primary", true);
    let secondary = SwitchableSource::new("secondary", false);
    let cache = SeriesCache::new(resilient(primary.clone(), secondary.clone()), SeriesStore::new(dir.path()));

    let fetched = cache.fetch(&MemoryCache::new(), "ABC", Timeframe::H1, 2).await;

    assert_eq!(fetched.bars.len(), 48);
    assert!(fetched.fresh);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
    assert_eq!(cache.store().load("ABC", Timeframe::H1).unwrap().len(), 48);
}

#[tokio::test]
async fn test_total_outage_serves_disk_series() {
    let dir = TempDir::new().unwrap();
    let primary = SwitchableSource::new("primary", false);
    let secondary = SwitchableSource::new("secondary", true);
    let cache = SeriesCache::new(resilient(primary.clone(), secondary.clone()), SeriesStore::new(dir.path()));

    let warm = cache.fetch(&MemoryCache::new(), "ABC", Timeframe::H1, 2).await;
    assert_eq!(warm.bars.len(), 48);

    primary.down.store(true, Ordering::SeqCst);
    let stale = cache.fetch(&MemoryCache::new(), "ABC", Timeframe::H1, 2).await;

    assert_eq!(stale.bars.as_slice(), warm.bars.as_slice());
    assert!(stale.is_stale());
    assert_eq!(primary.calls(), 2);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test]
async fn test_outage_without_history_is_empty() {
    let dir = TempDir::new().unwrap();
    let primary = SwitchableSource::new("primary", true);
    let secondary = SwitchableSource::new("secondary", true);
    let cache = SeriesCache::new(resilient(primary, secondary), SeriesStore::new(dir.path()));
    let memory = MemoryCache::new();

    let fetched = cache.fetch(&memory, "ABC", Timeframe::Daily, 30).await;

    assert!(fetched.bars.is_empty());
    assert!(fetched.is_stale());
    assert!(cache.store().load("ABC", Timeframe::Daily).is_none());
    let stats = memory.stats();
    assert_eq!(stats.empty_entries, 1);
    assert_eq!(stats.stale_entries, 1);
}
