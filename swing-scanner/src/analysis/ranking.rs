//! Weekly performance ranking across the universe.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::data::{Bar, Quote};

/// Rank used for symbols that could not be ranked.
pub const UNRANKED: u32 = 999;

/// Bars needed for a weekly return (today and five sessions back).
pub const WEEKLY_BARS: usize = 6;

/// Weekly moves beyond this magnitude are treated as bad data.
pub const ANOMALY_THRESHOLD_PCT: f64 = 500.0;

/// Default category for symbols outside every index list.
pub const DEFAULT_CATEGORY: &str = "Total Market";

/// One symbol's weekly standing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub symbol: String,
    pub weekly_change_percent: f64,
    /// 1 = best weekly performer
    pub rank: u32,
    pub category: String,
}

/// Rank of `symbol` in `ranks`, or [`UNRANKED`].
pub fn rank_of(ranks: &HashMap<String, RankEntry>, symbol: &str) -> u32 {
    ranks.get(symbol).map_or(UNRANKED, |r| r.rank)
}

/// Weekly return in percent, `None` with too little history or a zero base.
pub fn weekly_change_percent(bars: &[Bar]) -> Option<f64> {
    if bars.len() < WEEKLY_BARS {
        return None;
    }
    let latest = bars[bars.len() - 1].close;
    let week_ago = bars[bars.len() - WEEKLY_BARS].close;
    if week_ago == 0.0 {
        return None;
    }
    Some((latest - week_ago) / week_ago * 100.0)
}

/// Ranks symbols by weekly change.
#[derive(Debug, Clone, Default)]
pub struct UniverseRanker {
    categories: HashMap<String, String>,
}

impl UniverseRanker {
    pub fn new(categories: HashMap<String, String>) -> Self {
        Self { categories }
    }

    pub fn category_of(&self, symbol: &str) -> String {
        self.categories
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
    }

    /// Rank `daily` (symbol, daily bars) pairs by weekly change descending.
    ///
    /// Ties keep input order. Ranks are dense from 1. Symbols without a
    /// weekly return are absent from the result; an anomalous return
    /// (beyond ±500 %) is reset to 0 and still ranked.
    pub fn rank<S: AsRef<str>, B: AsRef<[Bar]>>(&self, daily: &[(S, B)]) -> HashMap<String, RankEntry> {
        let mut moves: Vec<(String, f64)> = daily
            .iter()
            .filter_map(|(symbol, bars)| {
                let symbol = symbol.as_ref();
                let mut pct = weekly_change_percent(bars.as_ref())?;
                if pct.abs() > ANOMALY_THRESHOLD_PCT {
                    warn!(symbol = %symbol, weekly_pct = pct, "Anomalous weekly move, resetting to 0");
                    pct = 0.0;
                }
                Some((symbol.to_string(), pct))
            })
            .collect();

        // stable: equal moves keep input order
        moves.sort_by(|a, b| b.1.total_cmp(&a.1));

        moves
            .into_iter()
            .enumerate()
            .map(|(i, (symbol, pct))| {
                let entry = RankEntry {
                    symbol: symbol.clone(),
                    weekly_change_percent: pct,
                    rank: i as u32 + 1,
                    category: self.category_of(&symbol),
                };
                (symbol, entry)
            })
            .collect()
    }
}

/// Momentum shortlist from a bulk quote snapshot: the `gainers` biggest
/// risers plus the `losers` biggest fallers by change versus previous close.
///
/// Quotes with a non-finite change are ignored. Equal changes order by
/// symbol so the cut is deterministic.
pub fn quote_shortlist(quotes: &HashMap<String, Quote>, gainers: usize, losers: usize) -> HashSet<String> {
    let mut moves: Vec<(&str, f64)> = quotes
        .iter()
        .map(|(symbol, quote)| (symbol.as_str(), quote.change_percent()))
        .filter(|(_, pct)| pct.is_finite())
        .collect();
    moves.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let top = moves.iter().take(gainers);
    let bottom = moves.iter().rev().take(losers);
    top.chain(bottom).map(|(symbol, _)| symbol.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn quote(symbol: &str, last: f64, prev_close: f64) -> (String, Quote) {
        (
            symbol.to_string(),
            Quote {
                symbol: symbol.to_string(),
                last,
                prev_close,
                volume: 0.0,
                timestamp: Utc::now(),
            },
        )
    }

    fn closes(values: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::days(i as i64), c, c, c, c, 1.0))
            .collect()
    }

    #[test]
    fn test_weekly_change() {
        let bars = closes(&[100.0, 101.0, 102.0, 103.0, 104.0, 115.0]);
        let pct = weekly_change_percent(&bars).unwrap();
        assert!((pct - 15.0).abs() < 1e-9);
        assert!(weekly_change_percent(&bars[..5]).is_none());
    }

    #[test]
    fn test_single_symbol_ranks_first() {
        let ranker = UniverseRanker::default();
        let ranks = ranker.rank(&[("ABC", closes(&[100.0, 101.0, 102.0, 103.0, 104.0, 115.0]))]);

        let entry = &ranks["ABC"];
        assert_eq!(entry.rank, 1);
        assert!((entry.weekly_change_percent - 15.0).abs() < 1e-9);
        assert_eq!(entry.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_ordering_ties_and_unranked() {
        let categories = HashMap::from([("B".to_string(), "Midcap".to_string())]);
        let ranker = UniverseRanker::new(categories);
        let daily = vec![
            ("A", closes(&[100.0, 0.0, 0.0, 0.0, 0.0, 110.0])),
            ("B", closes(&[100.0, 0.0, 0.0, 0.0, 0.0, 120.0])),
            ("C", closes(&[100.0, 0.0, 0.0, 0.0, 0.0, 110.0])),
            ("D", closes(&[100.0, 110.0])),
            ("E", closes(&[0.0, 1.0, 1.0, 1.0, 1.0, 1.0])),
        ];

        let ranks = ranker.rank(&daily);
        assert_eq!(ranks.len(), 3);
        assert_eq!(ranks["B"].rank, 1);
        assert_eq!(ranks["B"].category, "Midcap");
        assert_eq!(ranks["A"].rank, 2);
        assert_eq!(ranks["C"].rank, 3);
        assert_eq!(rank_of(&ranks, "D"), UNRANKED);
        assert_eq!(rank_of(&ranks, "E"), UNRANKED);
    }

    #[test]
    fn test_anomaly_reset_to_zero() {
        let ranker = UniverseRanker::default();
        let daily = vec![
            ("SPLIT", closes(&[1.0, 1.0, 1.0, 1.0, 1.0, 10.0])),
            ("DOWN", closes(&[100.0, 1.0, 1.0, 1.0, 1.0, 95.0])),
        ];

        let ranks = ranker.rank(&daily);
        assert_eq!(ranks["SPLIT"].weekly_change_percent, 0.0);
        assert_eq!(ranks["SPLIT"].rank, 1);
        assert_eq!(ranks["DOWN"].rank, 2);
    }

    #[test]
    fn test_quote_shortlist_takes_both_ends() {
        let quotes = HashMap::from([
            quote("RISER", 110.0, 100.0),
            quote("UP", 102.0, 100.0),
            quote("FLAT", 100.0, 100.0),
            quote("DIP", 98.0, 100.0),
            quote("SLUMP", 90.0, 100.0),
            quote("BROKEN", 5.0, 0.0),
        ]);

        let shortlist = quote_shortlist(&quotes, 2, 1);
        let expected: HashSet<String> = ["RISER", "UP", "SLUMP"].iter().map(|s| s.to_string()).collect();
        // BROKEN has no previous close: change 0, ties FLAT and sorts first by name
        assert_eq!(shortlist, expected);
    }

    #[test]
    fn test_quote_shortlist_small_snapshot_overlaps() {
        let quotes = HashMap::from([quote("A", 101.0, 100.0), quote("B", 99.0, 100.0)]);
        assert_eq!(quote_shortlist(&quotes, 100, 50).len(), 2);
        assert!(quote_shortlist(&HashMap::new(), 100, 50).is_empty());
    }
}
