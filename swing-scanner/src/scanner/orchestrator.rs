//! Scan orchestrator.
//!
//! One run walks four progress bands:
//!
//! 1. Phase 1 (0-45 %): daily bars for every target, daily pre-score, promotion
//!    (pre-score, held/watched, or the bulk-quote gainer/loser shortlist)
//! 2. Phase 2 (45-85 %): hourly and 15-minute bars for promoted symbols, full scores
//! 3. Aggregation (85-90 %): one snapshot per timeframe, published atomically
//! 4. Analysis (90-100 %): watchlist ledger, exit signals, persistence, alerts
//!
//! Per-symbol problems become [`SkippedSymbol`] entries. A symbol is scored
//! only when all three timeframes were fetched in this run and carry
//! defined indicators; a series left over from an earlier run is never
//! mixed with fresh ones. Only failing to write the status record or a
//! snapshot aborts the run.

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swing_common::logging::generate_run_id;
use swing_common::{Config, NotificationConfig, ScannerConfig, WatchlistConfig};
use tracing::{debug, info, info_span, warn, Instrument};

use super::report::{sort_results, ScanMode, ScanReport, ScanResult, SkipReason, SkippedSymbol};
use super::status::{ProgressTracker, StatusWriter};
use crate::analysis::exits::{evaluate_exit, ExitSignal};
use crate::analysis::indicators::{enrich_latest, EnrichedBar, MIN_SCORING_BARS};
use crate::analysis::ranking::{quote_shortlist, RankEntry, DEFAULT_CATEGORY};
use crate::analysis::scoring::{classify, daily_pre_score, entry_score, weakness_score};
use crate::analysis::setup::{setup_for, trade_plan};
use crate::data::{
    Bar, CachedSeries, DataSource, MemoryCache, SeriesCache, SeriesStore, SnapshotPublisher, Timeframe,
};
use crate::notification::{Notification, NotificationSink};
use crate::portfolio::{open_symbols, Position};
use crate::store::PersistenceStore;
use crate::universe::Universe;
use crate::watchlist::{Candidate, WatchlistLedger};

/// Exit signals for open positions, rewritten every run.
pub const PORTFOLIO_FILE: &str = "portfolio_analysis.json";

const PHASE1_BAND: (u8, u8) = (0, 45);
const PHASE2_BAND: (u8, u8) = (45, 85);
const AGGREGATE_BAND: (u8, u8) = (85, 90);
const ANALYSIS_BAND: (u8, u8) = (90, 100);

/// Full result for one scored symbol.
#[derive(Debug, Clone)]
pub struct ScoredSymbol {
    pub result: ScanResult,
    pub latest_h1: EnrichedBar,
}

/// Latest enriched bar of a series that is long enough to score.
fn scoring_bar(timeframe: Timeframe, bars: &[Bar]) -> std::result::Result<EnrichedBar, SkipReason> {
    if bars.is_empty() {
        return Err(SkipReason::NoData { timeframe });
    }
    if bars.len() < MIN_SCORING_BARS {
        return Err(SkipReason::InsufficientHistory {
            timeframe,
            bars: bars.len(),
        });
    }
    match enrich_latest(bars) {
        Some(latest) if latest.is_scoring_ready() => Ok(latest),
        _ => Err(SkipReason::IndicatorsUnavailable { timeframe }),
    }
}

/// Score one symbol from its three series.
///
/// Every timeframe needs at least [`MIN_SCORING_BARS`] bars and a latest bar
/// with RSI and volume average defined; otherwise the symbol is skipped with
/// the first failing reason, checked daily, then 1h, then 15m.
pub fn score_symbol(
    symbol: &str,
    daily: &[Bar],
    h1: &[Bar],
    m15: &[Bar],
    ranks: &HashMap<String, RankEntry>,
) -> std::result::Result<ScoredSymbol, SkipReason> {
    let d1 = scoring_bar(Timeframe::Daily, daily)?;
    let h1e = scoring_bar(Timeframe::H1, h1)?;
    let m15e = scoring_bar(Timeframe::M15, m15)?;

    let entry = entry_score(&m15e, &h1e, &d1);
    let weakness = weakness_score(&h1e, &d1);
    let rank = ranks.get(symbol);
    let classification = classify(entry, weakness, rank);
    let setup = setup_for(entry, &h1e);
    let plan = trade_plan(entry, &h1e, daily);

    let price = h1e.close();
    let prev_close = daily.len().checked_sub(2).map(|i| daily[i].close);
    let change_percent = match prev_close {
        Some(prev) if prev > 0.0 => (price - prev) / prev * 100.0,
        _ => 0.0,
    };

    let result = ScanResult {
        symbol: symbol.to_string(),
        price,
        change_percent,
        entry_score: entry,
        weakness_score: weakness,
        weekly_change_percent: rank.map(|r| r.weekly_change_percent),
        rank: rank.map(|r| r.rank),
        category: rank.map_or_else(|| DEFAULT_CATEGORY.to_string(), |r| r.category.clone()),
        tag: classification.tag,
        confidence: classification.confidence,
        rsi: h1e.rsi,
        chop: h1e.chop,
        setup: setup.kind,
        entry: setup.entry,
        stop: plan.stop,
        target: plan.target,
        probability_pct: plan.probability_pct,
        expected_value_pct: plan.expected_value_pct,
        break_level: plan.break_level,
    };

    Ok(ScoredSymbol {
        result,
        latest_h1: h1e,
    })
}

/// Runs scans against one data source, record store and sink.
pub struct ScanOrchestrator {
    source: Arc<dyn DataSource>,
    scanner: ScannerConfig,
    watchlist: WatchlistConfig,
    notification: NotificationConfig,
    universe: Universe,
    cache: SeriesCache,
    publisher: SnapshotPublisher,
    cache_dir: PathBuf,
    exchange_offset: FixedOffset,
    store: Arc<dyn PersistenceStore>,
    sink: Arc<dyn NotificationSink>,
}

impl ScanOrchestrator {
    pub fn new(
        config: &Config,
        source: Arc<dyn DataSource>,
        store: Arc<dyn PersistenceStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let cache_dir = config.scanner.cache_path();
        let cache = SeriesCache::new(Arc::clone(&source), SeriesStore::new(&cache_dir))
            .with_overlap_days(config.scanner.overlap_days)
            .with_exchange_offset_minutes(config.scanner.exchange_utc_offset_minutes);
        let exchange_offset = FixedOffset::east_opt(config.scanner.exchange_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());

        Self {
            source,
            scanner: config.scanner.clone(),
            watchlist: config.watchlist.clone(),
            notification: config.notification.clone(),
            universe: Universe::from_config(&config.universe),
            cache,
            publisher: SnapshotPublisher::new(&cache_dir),
            cache_dir,
            exchange_offset,
            store,
            sink,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Run one scan. On failure the status record is set to FAILED before
    /// the error is returned.
    pub async fn run(&self, mode: ScanMode, memory: &MemoryCache) -> Result<ScanReport> {
        let run_id = generate_run_id();
        let status = StatusWriter::new(&self.cache_dir, mode);
        let mut progress = ProgressTracker::new();

        let span = info_span!("scan", run_id = %run_id, mode = %mode);
        let outcome = self
            .run_phases(&run_id, mode, memory, &status, &mut progress)
            .instrument(span)
            .await;

        if let Err(e) = &outcome {
            let error = format!("{:#}", e);
            warn!(run_id = %run_id, error = %error, "Scan failed");
            if let Err(write_err) = status.failed(progress.label(), error.clone()) {
                warn!(error = %write_err, "Failed to record FAILED status");
            }
            self.notify(&Notification::JobStatus {
                state: super::JobState::Failed,
                progress: progress.label(),
                error: Some(error),
            })
            .await;
        }
        outcome
    }

    async fn run_phases(
        &self,
        run_id: &str,
        mode: ScanMode,
        memory: &MemoryCache,
        status: &StatusWriter,
        progress: &mut ProgressTracker,
    ) -> Result<ScanReport> {
        let started_at = Utc::now();
        status.running(progress.label()).context("Failed to write job status")?;

        let positions = match self.store.load_positions().await {
            Ok(positions) => positions,
            Err(e) => {
                warn!(error = %e, "Failed to load positions, continuing without");
                Vec::new()
            }
        };
        let mut ledger = match self.store.load_watchlist().await {
            Ok(records) => WatchlistLedger::new(self.watchlist.clone(), records),
            Err(e) => {
                warn!(error = %e, "Failed to load watchlist, starting empty");
                WatchlistLedger::new(self.watchlist.clone(), Vec::new())
            }
        };

        let held = open_symbols(&positions);
        let vip = ordered_union(&held, &ledger.active_symbols());
        let targets = match mode {
            ScanMode::Full => ordered_union(self.universe.symbols(), &vip),
            ScanMode::Watchlist => vip.clone(),
        };
        let vip: HashSet<String> = vip.into_iter().collect();

        let mut report = ScanReport {
            run_id: run_id.to_string(),
            mode,
            started_at,
            finished_at: started_at,
            targets: targets.len(),
            promoted: 0,
            results: Vec::new(),
            skipped: Vec::new(),
            exits: Vec::new(),
            admitted: Vec::new(),
        };

        if targets.is_empty() {
            info!("No symbols to scan");
            status.completed("No Data").context("Failed to write job status")?;
            report.finished_at = Utc::now();
            return Ok(report);
        }

        info!(targets = targets.len(), held = held.len(), "Scan started");

        // ---- Phase 1: daily bars, pre-score, promotion ----
        progress.enter(PHASE1_BAND.0, PHASE1_BAND.1);
        let shortlist = match mode {
            ScanMode::Full => self.quote_shortlist(self.universe.symbols()).await,
            ScanMode::Watchlist => HashSet::new(),
        };
        let daily = self.fetch_daily(&targets, memory, status, progress).await?;

        let mut ranked_input: Vec<(String, Arc<Vec<Bar>>)> = Vec::new();
        let mut promoted: Vec<(String, Arc<Vec<Bar>>)> = Vec::new();
        let mut passed_over: Vec<(String, Arc<Vec<Bar>>)> = Vec::new();
        for (symbol, series) in daily {
            let bars = series.bars;
            if bars.is_empty() {
                report.skipped.push(skip(&symbol, SkipReason::NoData { timeframe: Timeframe::Daily }));
                continue;
            }
            ranked_input.push((symbol.clone(), bars.clone()));

            if !series.fresh {
                report.skipped.push(skip(&symbol, SkipReason::Stale { timeframe: Timeframe::Daily }));
                continue;
            }
            if bars.len() < self.scanner.min_daily_bars.max(MIN_SCORING_BARS) {
                report.skipped.push(skip(
                    &symbol,
                    SkipReason::InsufficientHistory {
                        timeframe: Timeframe::Daily,
                        bars: bars.len(),
                    },
                ));
                continue;
            }
            let latest = match enrich_latest(&bars) {
                Some(latest) if latest.is_scoring_ready() => latest,
                _ => {
                    report.skipped.push(skip(
                        &symbol,
                        SkipReason::IndicatorsUnavailable {
                            timeframe: Timeframe::Daily,
                        },
                    ));
                    continue;
                }
            };

            let pre_score = daily_pre_score(&latest);
            if mode == ScanMode::Watchlist
                || vip.contains(&symbol)
                || shortlist.contains(&symbol)
                || pre_score >= self.scanner.pre_score_threshold
            {
                promoted.push((symbol, bars));
            } else {
                debug!(symbol = %symbol, pre_score, "Not promoted");
                passed_over.push((symbol, bars));
            }
        }

        if mode == ScanMode::Full && promoted.is_empty() && !passed_over.is_empty() {
            let take = self.scanner.fallback_promotions.min(passed_over.len());
            warn!(promoting = take, "Nothing promoted, falling back to the first symbols scanned");
            promoted.extend(passed_over.into_iter().take(take));
        }
        report.promoted = promoted.len();
        info!(
            fetched = ranked_input.len(),
            promoted = promoted.len(),
            skipped = report.skipped.len(),
            "Phase 1 (daily) complete"
        );

        let rank_pairs: Vec<(&str, &[Bar])> = ranked_input
            .iter()
            .map(|(symbol, bars)| (symbol.as_str(), bars.as_slice()))
            .collect();
        let ranks = self.universe.ranker().rank(&rank_pairs);

        // ---- Phase 2: intraday bars and full scores ----
        progress.enter(PHASE2_BAND.0, PHASE2_BAND.1);
        status.running(progress.label()).context("Failed to write job status")?;
        let (results, latest_h1, skipped) = self.score_promoted(&promoted, &ranks, memory, status, progress).await?;
        report.results = results;
        report.skipped.extend(skipped);
        sort_results(&mut report.results);
        info!(
            scored = report.results.len(),
            skipped = report.skipped.len(),
            "Phase 2 (intraday) complete"
        );

        // ---- Aggregation ----
        progress.enter(AGGREGATE_BAND.0, AGGREGATE_BAND.1);
        status.running(progress.label()).context("Failed to write job status")?;
        let promoted_symbols: Vec<String> = promoted.iter().map(|(s, _)| s.clone()).collect();
        for (i, timeframe) in Timeframe::ALL.into_iter().enumerate() {
            let symbols = if timeframe == Timeframe::Daily { &targets } else { &promoted_symbols };
            self.publisher
                .aggregate_and_publish(self.cache.store(), timeframe, symbols)
                .with_context(|| format!("Failed to publish {} snapshot", timeframe))?;
            self.step(status, progress, i + 1, Timeframe::ALL.len())?;
        }

        // ---- Analysis ----
        progress.enter(ANALYSIS_BAND.0, ANALYSIS_BAND.1);
        status.running(progress.label()).context("Failed to write job status")?;
        let now = Utc::now();
        let today = now.with_timezone(&self.exchange_offset).date_naive();

        report.admitted = self.update_watchlist(&mut ledger, &report.results, &held, today, now).await;
        self.step(status, progress, 1, 4)?;

        report.exits = self.evaluate_exits(&positions, &latest_h1, memory, today).await;
        self.step(status, progress, 2, 4)?;

        if let Err(e) = self.store.save_scan_results(&report.results).await {
            warn!(error = %e, "Failed to persist scan results");
        }
        self.step(status, progress, 3, 4)?;

        if self.notification.notify_scan_summary {
            let picks: Vec<ScanResult> = report.high_conviction().cloned().collect();
            if !picks.is_empty() {
                self.notify(&Notification::ScanSummary {
                    mode,
                    scanned: report.targets,
                    picks,
                })
                .await;
            }
        }

        progress.finish();
        status.completed(progress.label()).context("Failed to write job status")?;
        report.finished_at = Utc::now();

        info!(
            results = report.results.len(),
            high_conviction = report.high_conviction().count(),
            exits = report.exits.len(),
            admitted = report.admitted.len(),
            duration_ms = (report.finished_at - started_at).num_milliseconds(),
            "Scan complete"
        );
        Ok(report)
    }

    /// Bulk quote snapshot reduced to the gainer/loser shortlist. Empty when
    /// the feed fails or has nothing.
    async fn quote_shortlist(&self, symbols: &[String]) -> HashSet<String> {
        if symbols.is_empty() {
            return HashSet::new();
        }
        match self.source.get_latest_quotes(symbols).await {
            Ok(quotes) => {
                let shortlist = quote_shortlist(&quotes, self.scanner.quote_gainers, self.scanner.quote_losers);
                info!(quotes = quotes.len(), shortlisted = shortlist.len(), "Quote shortlist built");
                shortlist
            }
            Err(e) => {
                warn!(error = %e, "Bulk quote snapshot failed, promoting on pre-score only");
                HashSet::new()
            }
        }
    }

    /// Daily series for every target, in target order.
    async fn fetch_daily(
        &self,
        targets: &[String],
        memory: &MemoryCache,
        status: &StatusWriter,
        progress: &mut ProgressTracker,
    ) -> Result<Vec<(String, CachedSeries)>> {
        let lookback = self.scanner.lookback_daily_days;
        let mut fetched = Vec::with_capacity(targets.len());

        let mut stream = stream::iter(targets.iter().enumerate())
            .map(|(i, symbol)| async move {
                let bars = self.cache.fetch(memory, symbol, Timeframe::Daily, lookback).await;
                (i, symbol.clone(), bars)
            })
            .buffer_unordered(self.scanner.effective_concurrency());

        while let Some(item) = stream.next().await {
            fetched.push(item);
            self.step(status, progress, fetched.len(), targets.len())?;
        }

        fetched.sort_by_key(|(i, _, _)| *i);
        Ok(fetched.into_iter().map(|(_, symbol, bars)| (symbol, bars)).collect())
    }

    async fn score_promoted(
        &self,
        promoted: &[(String, Arc<Vec<Bar>>)],
        ranks: &HashMap<String, RankEntry>,
        memory: &MemoryCache,
        status: &StatusWriter,
        progress: &mut ProgressTracker,
    ) -> Result<(Vec<ScanResult>, HashMap<String, EnrichedBar>, Vec<SkippedSymbol>)> {
        let hourly_days = self.scanner.lookback_hourly_days;
        let m15_days = self.scanner.lookback_m15_days;

        let mut results = Vec::new();
        let mut latest_h1 = HashMap::new();
        let mut skipped = Vec::new();
        let mut done = 0;

        let mut stream = stream::iter(promoted.iter())
            .map(|(symbol, daily)| async move {
                let h1 = self.cache.fetch(memory, symbol, Timeframe::H1, hourly_days).await;
                let m15 = self.cache.fetch(memory, symbol, Timeframe::M15, m15_days).await;
                (symbol, daily, h1, m15)
            })
            .buffer_unordered(self.scanner.effective_concurrency());

        while let Some((symbol, daily, h1, m15)) = stream.next().await {
            done += 1;
            let stale = [(Timeframe::H1, &h1), (Timeframe::M15, &m15)]
                .into_iter()
                .find(|(_, series)| series.is_stale() && !series.bars.is_empty())
                .map(|(timeframe, _)| timeframe);
            let scored = match stale {
                Some(timeframe) => Err(SkipReason::Stale { timeframe }),
                None => score_symbol(symbol, daily, &h1.bars, &m15.bars, ranks),
            };
            match scored {
                Ok(scored) => {
                    debug!(
                        symbol = %symbol,
                        entry = scored.result.entry_score,
                        weakness = scored.result.weakness_score,
                        tag = %scored.result.tag,
                        "Scored"
                    );
                    latest_h1.insert(symbol.clone(), scored.latest_h1);
                    results.push(scored.result);
                }
                Err(reason) => {
                    warn!(symbol = %symbol, reason = %reason, "Skipping symbol");
                    skipped.push(skip(symbol, reason));
                }
            }
            self.step(status, progress, done, promoted.len())?;
        }

        Ok((results, latest_h1, skipped))
    }

    async fn update_watchlist(
        &self,
        ledger: &mut WatchlistLedger,
        results: &[ScanResult],
        held: &[String],
        today: NaiveDate,
        now: chrono::DateTime<Utc>,
    ) -> Vec<String> {
        let candidates: Vec<Candidate> = results
            .iter()
            .map(|r| Candidate {
                symbol: r.symbol.clone(),
                score: r.entry_score,
                weakness: r.weakness_score,
                price: r.price,
            })
            .collect();
        let held: HashSet<String> = held.iter().cloned().collect();

        let update = ledger.update(&candidates, &held, today, now);
        if let Err(e) = self.store.save_watchlist(&update.records).await {
            warn!(error = %e, "Failed to persist watchlist");
        }

        for symbol in &update.admitted {
            if let Some(result) = results.iter().find(|r| &r.symbol == symbol) {
                self.notify(&Notification::NewEntry {
                    symbol: symbol.clone(),
                    price: result.price,
                    score: result.entry_score,
                })
                .await;
            }
        }
        update.admitted
    }

    async fn evaluate_exits(
        &self,
        positions: &[Position],
        latest_h1: &HashMap<String, EnrichedBar>,
        memory: &MemoryCache,
        today: NaiveDate,
    ) -> Vec<ExitSignal> {
        let mut signals = Vec::new();

        for position in positions.iter().filter(|p| p.is_open()) {
            let bar = match latest_h1.get(&position.symbol) {
                Some(bar) => Some(bar.clone()),
                None => {
                    let h1 = self
                        .cache
                        .fetch(memory, &position.symbol, Timeframe::H1, self.scanner.lookback_hourly_days)
                        .await;
                    if h1.is_stale() {
                        None
                    } else {
                        enrich_latest(&h1.bars)
                    }
                }
            };
            let Some(bar) = bar else {
                warn!(symbol = %position.symbol, "No fresh hourly data for open position");
                continue;
            };

            let signal = evaluate_exit(position, &bar, today);
            info!(
                symbol = %signal.symbol,
                action = %signal.action,
                pnl_pct = signal.pnl_percent,
                "Exit check"
            );
            if signal.action.is_actionable() && self.notification.notify_exits {
                self.notify(&Notification::ExitAlert(signal.clone())).await;
            }
            signals.push(signal);
        }

        let path = self.cache_dir.join(PORTFOLIO_FILE);
        if let Err(e) = swing_common::fs::write_json_atomic(&path, &signals) {
            warn!(path = %path.display(), error = %e, "Failed to write portfolio analysis");
        }
        signals
    }

    /// Advance progress and record it when the percentage moves.
    fn step(&self, status: &StatusWriter, progress: &mut ProgressTracker, done: usize, total: usize) -> Result<()> {
        let before = progress.percent();
        if progress.advance(done, total) != before {
            status.running(progress.label()).context("Failed to write job status")?;
        }
        Ok(())
    }

    async fn notify(&self, notification: &Notification) {
        if let Err(e) = self.sink.notify(notification).await {
            warn!(error = %e, "Notification failed");
        }
    }
}

fn skip(symbol: &str, reason: SkipReason) -> SkippedSymbol {
    SkippedSymbol {
        symbol: symbol.to_string(),
        reason,
    }
}

/// `first` followed by the items of `second` not already present.
fn ordered_union(first: &[String], second: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .iter()
        .chain(second)
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::scoring::Confidence;
    use chrono::{Duration, TimeZone};

    fn trending(n: usize, step: Duration) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar::new(start + step * i as i32, close - 0.5, close + 0.5, close - 1.0, close, 1000.0)
            })
            .collect()
    }

    #[test]
    fn test_ordered_union() {
        let a = vec!["A".to_string(), "B".to_string()];
        let b = vec!["B".to_string(), "C".to_string(), "A".to_string()];
        assert_eq!(ordered_union(&a, &b), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_score_symbol_requires_all_timeframes() {
        let daily = trending(40, Duration::days(1));
        let h1 = trending(40, Duration::hours(1));

        let err = score_symbol("ABC", &daily, &h1, &[], &HashMap::new()).unwrap_err();
        assert_eq!(err, SkipReason::NoData { timeframe: Timeframe::M15 });

        let err = score_symbol("ABC", &[], &h1, &h1, &HashMap::new()).unwrap_err();
        assert_eq!(err, SkipReason::NoData { timeframe: Timeframe::Daily });
    }

    #[test]
    fn test_score_symbol_rejects_short_intraday_series() {
        let daily = trending(40, Duration::days(1));
        let h1 = trending(2, Duration::hours(1));
        let m15 = trending(1, Duration::minutes(15));

        let err = score_symbol("NEW", &daily, &h1, &m15, &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            SkipReason::InsufficientHistory {
                timeframe: Timeframe::H1,
                bars: 2
            }
        );

        let h1 = trending(40, Duration::hours(1));
        let err = score_symbol("NEW", &daily, &h1, &m15, &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            SkipReason::InsufficientHistory {
                timeframe: Timeframe::M15,
                bars: 1
            }
        );
    }

    #[test]
    fn test_score_symbol_flat_series_has_no_indicators() {
        let daily = trending(40, Duration::days(1));
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap();
        let flat: Vec<Bar> = (0..40)
            .map(|i| Bar::new(start + Duration::hours(i), 50.0, 50.0, 50.0, 50.0, 100.0))
            .collect();

        let err = score_symbol("FLAT", &daily, &flat, &flat, &HashMap::new()).unwrap_err();
        assert_eq!(err, SkipReason::IndicatorsUnavailable { timeframe: Timeframe::H1 });
    }

    #[test]
    fn test_score_symbol_uptrend() {
        let daily = trending(40, Duration::days(1));
        let h1 = trending(60, Duration::hours(1));
        let m15 = trending(60, Duration::minutes(15));
        let ranks = HashMap::from([(
            "ABC".to_string(),
            RankEntry {
                symbol: "ABC".to_string(),
                weekly_change_percent: 4.0,
                rank: 3,
                category: "Midcap".to_string(),
            },
        )]);

        let scored = score_symbol("ABC", &daily, &h1, &m15, &ranks).unwrap();
        let result = &scored.result;
        assert!(result.entry_score <= 10);
        assert_eq!(result.price, 159.0);
        assert_eq!(result.rank, Some(3));
        assert_eq!(result.category, "Midcap");
        // close above EMA20 on every timeframe, so no trend weakness
        assert!(result.weakness_score < 7);
        if result.entry_score >= 7 {
            assert_eq!(result.confidence, Confidence::Extreme);
        }
        // previous daily close is 138
        assert!((result.change_percent - (159.0 - 138.0) / 138.0 * 100.0).abs() < 1e-9);
    }
}
