//! Composite entry and weakness scores, and signal classification.
//!
//! Both scores are integers in [0, 10]. The entry score sums five factors
//! of at most 2 points each; the weakness score sums four buckets capped at
//! 3 + 3 + 2 + 2. Point values are fixed.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::indicators::EnrichedBar;
use super::ranking::RankEntry;

pub const MAX_SCORE: u8 = 10;

/// Entry score at or above which a symbol is high conviction.
pub const HIGH_CONVICTION_SCORE: u8 = 8;

/// Weakness score at or above which a symbol is a sell signal.
pub const SELL_SIGNAL_WEAKNESS: u8 = 7;

// ============================================================================
// Entry Score
// ============================================================================

/// Per-factor entry points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryBreakdown {
    /// Close above EMA20 on 15m, 1h and 1d: 0 or 2
    pub trend: u8,
    /// RSI(1h) regime: 0, 1 or 2
    pub momentum_regime: u8,
    /// Volume expansion on a bullish 1h bar: 1 or 2
    pub volume: u8,
    /// Low choppiness on 1h: 0, 1 or 2
    pub structure: u8,
    /// Close above EMA20 with MACD above signal on 1h: 1 or 2
    pub momentum_cross: u8,
}

impl EntryBreakdown {
    pub fn total(&self) -> u8 {
        let sum = self.trend.min(2)
            + self.momentum_regime.min(2)
            + self.volume.min(2)
            + self.structure.min(2)
            + self.momentum_cross.min(2);
        sum.min(MAX_SCORE)
    }
}

/// Factor breakdown of the entry score from the latest bar of each timeframe.
pub fn entry_breakdown(m15: &EnrichedBar, h1: &EnrichedBar, d1: &EnrichedBar) -> EntryBreakdown {
    let trend = if m15.close() > m15.ema20 && h1.close() > h1.ema20 && d1.close() > d1.ema20 {
        2
    } else {
        0
    };

    let momentum_regime = match h1.rsi {
        Some(rsi) if (55.0..=70.0).contains(&rsi) => 2,
        Some(rsi) if (50.0..75.0).contains(&rsi) => 1,
        _ => 0,
    };

    let volume_expansion = h1
        .volume_sma
        .is_some_and(|sma| h1.bar.volume > 1.2 * sma);
    let volume = if volume_expansion && h1.bar.is_bullish() { 2 } else { 1 };

    let structure = if h1.chop < 50.0 {
        2
    } else if h1.chop < 55.0 {
        1
    } else {
        0
    };

    let momentum_cross = if h1.close() > h1.ema20 && h1.macd_bullish() { 2 } else { 1 };

    EntryBreakdown {
        trend,
        momentum_regime,
        volume,
        structure,
        momentum_cross,
    }
}

/// Entry score in [0, 10].
pub fn entry_score(m15: &EnrichedBar, h1: &EnrichedBar, d1: &EnrichedBar) -> u8 {
    entry_breakdown(m15, h1, d1).total()
}

// ============================================================================
// Weakness Score
// ============================================================================

/// Per-bucket weakness points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaknessBreakdown {
    /// 1h close below EMA20 (+2), daily close below EMA20 (+1); cap 3
    pub trend_broken: u8,
    /// RSI < 40 (+2) or < 50 (+1), MACD below signal (+1); cap 3
    pub momentum_fade: u8,
    /// Bearish 1h bar on above-average volume; cap 2
    pub distribution: u8,
    /// Down-close on 1h; cap 2
    pub structure: u8,
}

impl WeaknessBreakdown {
    pub fn total(&self) -> u8 {
        let sum = self.trend_broken.min(3)
            + self.momentum_fade.min(3)
            + self.distribution.min(2)
            + self.structure.min(2);
        sum.min(MAX_SCORE)
    }
}

/// Weakness breakdown from the latest 1h and daily bars.
pub fn weakness_breakdown(h1: &EnrichedBar, d1: &EnrichedBar) -> WeaknessBreakdown {
    let mut trend_broken = 0;
    if h1.close() < h1.ema20 {
        trend_broken += 2;
    }
    if d1.close() < d1.ema20 {
        trend_broken += 1;
    }

    let mut momentum_fade = match h1.rsi {
        Some(rsi) if rsi < 40.0 => 2,
        Some(rsi) if rsi < 50.0 => 1,
        _ => 0,
    };
    if h1.macd < h1.macd_signal {
        momentum_fade += 1;
    }

    let heavy_volume = h1.volume_sma.is_some_and(|sma| h1.bar.volume > sma);
    let distribution = if h1.bar.is_bearish() && heavy_volume { 2 } else { 0 };

    let structure = if h1.bar.is_bearish() { 2 } else { 0 };

    WeaknessBreakdown {
        trend_broken,
        momentum_fade,
        distribution,
        structure,
    }
}

/// Weakness score in [0, 10].
pub fn weakness_score(h1: &EnrichedBar, d1: &EnrichedBar) -> u8 {
    weakness_breakdown(h1, d1).total()
}

// ============================================================================
// Daily Pre-Score
// ============================================================================

/// Cheap daily-only score (0..=6) used to promote symbols to the deep phase.
pub fn daily_pre_score(d1: &EnrichedBar) -> u8 {
    let mut score = 0;
    if d1.close() > d1.ema20 {
        score += 2;
    }
    match d1.rsi {
        Some(rsi) if (50.0..=75.0).contains(&rsi) => score += 2,
        Some(rsi) if (45.0..50.0).contains(&rsi) => score += 1,
        _ => {}
    }
    if d1.volume_sma.is_some_and(|sma| d1.bar.volume > sma) {
        score += 1;
    }
    if d1.macd_bullish() {
        score += 1;
    }
    score
}

// ============================================================================
// Classification
// ============================================================================

/// Signal tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tag {
    /// Top-10 weekly gainer with a solid entry score
    WeeklyGainer { rank: u32, category: String },
    /// High-conviction entry
    Rocket,
    /// Strong weekly gain with a good entry score
    Strong,
    /// Weakness dominates
    SellSignal,
    Wait,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeeklyGainer { rank, category } => write!(f, "#{} W.GAINER ({})", rank, category),
            Self::Rocket => write!(f, "ROCKET"),
            Self::Strong => write!(f, "STRONG"),
            Self::SellSignal => write!(f, "SELL SIGNAL"),
            Self::Wait => write!(f, "WAIT"),
        }
    }
}

/// Confidence attached to a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    High,
    Extreme,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::High => write!(f, "HIGH"),
            Self::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// Tag plus confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub tag: Tag,
    pub confidence: Confidence,
}

/// Classify a symbol. The first matching rule wins:
///
/// 1. rank ≤ 10 and entry ≥ 7 → weekly gainer, EXTREME
/// 2. entry ≥ 8 → ROCKET, HIGH
/// 3. weekly gain > 5 % and entry ≥ 6 → STRONG, HIGH
/// 4. weakness ≥ 7 → SELL SIGNAL, LOW
/// 5. WAIT, LOW
///
/// The latest 1h bar is not passed in: it reaches classification only as
/// its `weakness` score. `rank` is `None` for unranked symbols (treated as
/// rank 999, weekly change 0).
pub fn classify(entry: u8, weakness: u8, rank: Option<&RankEntry>) -> Classification {
    let (rank_no, weekly_pct) = rank.map_or((super::ranking::UNRANKED, 0.0), |r| {
        (r.rank, r.weekly_change_percent)
    });

    let (tag, confidence) = if rank_no <= 10 && entry >= 7 {
        let category = rank.map(|r| r.category.clone()).unwrap_or_default();
        (
            Tag::WeeklyGainer {
                rank: rank_no,
                category,
            },
            Confidence::Extreme,
        )
    } else if entry >= HIGH_CONVICTION_SCORE {
        (Tag::Rocket, Confidence::High)
    } else if weekly_pct > 5.0 && entry >= 6 {
        (Tag::Strong, Confidence::High)
    } else if weakness >= SELL_SIGNAL_WEAKNESS {
        (Tag::SellSignal, Confidence::Low)
    } else {
        (Tag::Wait, Confidence::Low)
    };

    Classification { tag, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Bar;
    use chrono::Utc;
    use proptest::prelude::*;

    fn bar_with(close: f64, open: f64, volume: f64) -> EnrichedBar {
        EnrichedBar {
            bar: Bar::new(Utc::now(), open, close.max(open), close.min(open), close, volume),
            ema9: close,
            ema20: close,
            ema50: close,
            ema200: close,
            rsi: Some(50.0),
            macd: 0.0,
            macd_signal: 0.0,
            true_range: Some(1.0),
            atr: Some(1.0),
            chop: 60.0,
            volume_sma: Some(1000.0),
            high_20: Some(close),
        }
    }

    fn strong_bar() -> EnrichedBar {
        let mut bar = bar_with(110.0, 100.0, 2000.0);
        bar.ema20 = 100.0;
        bar.rsi = Some(62.0);
        bar.macd = 1.5;
        bar.macd_signal = 1.0;
        bar.chop = 40.0;
        bar
    }

    fn rank_entry(rank: u32, pct: f64) -> RankEntry {
        RankEntry {
            symbol: "ABC".into(),
            weekly_change_percent: pct,
            rank,
            category: "Midcap".into(),
        }
    }

    #[test]
    fn test_perfect_entry_score() {
        let bar = strong_bar();
        let breakdown = entry_breakdown(&bar, &bar, &bar);
        assert_eq!(
            breakdown,
            EntryBreakdown {
                trend: 2,
                momentum_regime: 2,
                volume: 2,
                structure: 2,
                momentum_cross: 2,
            }
        );
        assert_eq!(breakdown.total(), 10);
    }

    #[test]
    fn test_entry_floor_factors() {
        // Volume and momentum cross never drop below 1
        let mut bar = bar_with(90.0, 100.0, 10.0);
        bar.ema20 = 100.0;
        bar.rsi = None;
        bar.chop = 80.0;
        assert_eq!(entry_score(&bar, &bar, &bar), 2);
    }

    #[test]
    fn test_rsi_regime_boundaries() {
        let base = strong_bar();
        let score_at = |rsi: f64| {
            let mut h1 = base.clone();
            h1.rsi = Some(rsi);
            entry_breakdown(&base, &h1, &base).momentum_regime
        };
        assert_eq!(score_at(55.0), 2);
        assert_eq!(score_at(70.0), 2);
        assert_eq!(score_at(50.0), 1);
        assert_eq!(score_at(72.0), 1);
        assert_eq!(score_at(75.0), 0);
        assert_eq!(score_at(49.9), 0);
    }

    #[test]
    fn test_structure_boundaries() {
        let base = strong_bar();
        let score_at = |chop: f64| {
            let mut h1 = base.clone();
            h1.chop = chop;
            entry_breakdown(&base, &h1, &base).structure
        };
        assert_eq!(score_at(49.9), 2);
        assert_eq!(score_at(50.0), 1);
        assert_eq!(score_at(55.0), 0);
    }

    #[test]
    fn test_max_weakness() {
        let mut h1 = bar_with(90.0, 100.0, 5000.0);
        h1.ema20 = 100.0;
        h1.rsi = Some(30.0);
        h1.macd = -1.0;
        let mut d1 = h1.clone();
        d1.ema20 = 95.0;

        let breakdown = weakness_breakdown(&h1, &d1);
        assert_eq!(breakdown.trend_broken, 3);
        assert_eq!(breakdown.momentum_fade, 3);
        assert_eq!(breakdown.distribution, 2);
        assert_eq!(breakdown.structure, 2);
        assert_eq!(weakness_score(&h1, &d1), 10);
    }

    #[test]
    fn test_no_weakness_on_strong_bar() {
        let bar = strong_bar();
        assert_eq!(weakness_score(&bar, &bar), 0);
    }

    #[test]
    fn test_daily_pre_score() {
        assert_eq!(daily_pre_score(&strong_bar()), 6);
        let mut weak = bar_with(90.0, 100.0, 10.0);
        weak.ema20 = 100.0;
        weak.rsi = Some(47.0);
        assert_eq!(daily_pre_score(&weak), 1);
    }

    #[test]
    fn test_classify_precedence() {
        let top = rank_entry(3, 12.0);
        let c = classify(7, 9, Some(&top));
        assert_eq!(c.tag.to_string(), "#3 W.GAINER (Midcap)");
        assert_eq!(c.confidence, Confidence::Extreme);

        let c = classify(8, 0, Some(&rank_entry(40, 1.0)));
        assert_eq!((c.tag, c.confidence), (Tag::Rocket, Confidence::High));

        let c = classify(6, 0, Some(&rank_entry(40, 6.0)));
        assert_eq!((c.tag, c.confidence), (Tag::Strong, Confidence::High));

        let c = classify(6, 7, Some(&rank_entry(40, 5.0)));
        assert_eq!((c.tag, c.confidence), (Tag::SellSignal, Confidence::Low));

        let c = classify(5, 2, None);
        assert_eq!((c.tag, c.confidence), (Tag::Wait, Confidence::Low));
    }

    #[test]
    fn test_unranked_never_weekly_gainer() {
        let c = classify(10, 0, None);
        assert_eq!(c.tag, Tag::Rocket);
    }

    fn arb_bar() -> impl Strategy<Value = EnrichedBar> {
        (
            1.0f64..1000.0,
            1.0f64..1000.0,
            0.0f64..1e7,
            1.0f64..1000.0,
            prop::option::of(0.0f64..100.0),
            -10.0f64..10.0,
            -10.0f64..10.0,
            0.0f64..100.0,
            prop::option::of(0.0f64..1e7),
        )
            .prop_map(|(close, open, volume, ema20, rsi, macd, signal, chop, vol_sma)| {
                let mut bar = bar_with(close, open, volume);
                bar.ema20 = ema20;
                bar.rsi = rsi;
                bar.macd = macd;
                bar.macd_signal = signal;
                bar.chop = chop;
                bar.volume_sma = vol_sma;
                bar
            })
    }

    proptest! {
        #[test]
        fn prop_scores_are_bounded(m15 in arb_bar(), h1 in arb_bar(), d1 in arb_bar()) {
            prop_assert!(entry_score(&m15, &h1, &d1) <= MAX_SCORE);
            prop_assert!(weakness_score(&h1, &d1) <= MAX_SCORE);
            prop_assert!(daily_pre_score(&d1) <= 6);
        }
    }
}
