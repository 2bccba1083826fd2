//! Scan outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::analysis::exits::ExitSignal;
use crate::analysis::scoring::{Confidence, Tag};
use crate::analysis::setup::SetupKind;
use crate::data::Timeframe;

/// Which symbols a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Whole universe plus held and watched symbols
    Full,
    /// Only held and actively watched symbols
    Watchlist,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Watchlist => f.write_str("watchlist"),
        }
    }
}

/// Why a symbol produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    NoData { timeframe: Timeframe },
    InsufficientHistory { timeframe: Timeframe, bars: usize },
    /// RSI or volume average undefined on the latest bar (e.g. a flat series)
    IndicatorsUnavailable { timeframe: Timeframe },
    /// The fetch failed and only bars from an earlier run were available
    Stale { timeframe: Timeframe },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData { timeframe } => write!(f, "no {} data", timeframe),
            Self::InsufficientHistory { timeframe, bars } => {
                write!(f, "only {} {} bars", bars, timeframe)
            }
            Self::IndicatorsUnavailable { timeframe } => write!(f, "{} indicators unavailable", timeframe),
            Self::Stale { timeframe } => write!(f, "stale {} data", timeframe),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

/// One scored symbol, as persisted in the latest-scan table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbol: String,
    pub price: f64,
    /// Change against the previous daily close, in percent
    pub change_percent: f64,
    pub entry_score: u8,
    pub weakness_score: u8,
    pub weekly_change_percent: Option<f64>,
    pub rank: Option<u32>,
    pub category: String,
    pub tag: Tag,
    pub confidence: Confidence,
    pub rsi: Option<f64>,
    pub chop: f64,
    pub setup: SetupKind,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub probability_pct: f64,
    pub expected_value_pct: f64,
    pub break_level: Option<f64>,
}

impl ScanResult {
    pub fn is_high_conviction(&self) -> bool {
        self.confidence >= Confidence::High
    }
}

/// Entry score descending, EXTREME first, then cheaper first.
pub fn compare_results(a: &ScanResult, b: &ScanResult) -> Ordering {
    let extreme = |r: &ScanResult| r.confidence == Confidence::Extreme;
    b.entry_score
        .cmp(&a.entry_score)
        .then_with(|| extreme(b).cmp(&extreme(a)))
        .then_with(|| a.price.total_cmp(&b.price))
}

pub fn sort_results(results: &mut [ScanResult]) {
    results.sort_by(compare_results);
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub run_id: String,
    pub mode: ScanMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub targets: usize,
    pub promoted: usize,
    pub results: Vec<ScanResult>,
    pub skipped: Vec<SkippedSymbol>,
    pub exits: Vec<ExitSignal>,
    pub admitted: Vec<String>,
}

impl ScanReport {
    pub fn high_conviction(&self) -> impl Iterator<Item = &ScanResult> {
        self.results.iter().filter(|r| r.is_high_conviction())
    }
}
