//! Trade setup naming and risk plan for scored candidates.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::indicators::EnrichedBar;
use crate::data::Bar;

/// Chart setup behind a candidate, judged on the latest 1h bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetupKind {
    /// Volume shock (> 2× average) through the 20-bar high
    RocketLaunch,
    /// Close through the 20-bar high
    RangeBreak,
    /// RSI above 60 without a breakout
    MomentumSwing,
    /// Strong score, wait for EMA20
    SwingBuild,
    /// Between EMA50 and EMA20, wait for EMA50
    PullbackWatch,
    Watch,
    /// Score too low for any setup
    Wait,
}

impl fmt::Display for SetupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RocketLaunch => "ROCKET LAUNCH",
            Self::RangeBreak => "RANGE BREAK",
            Self::MomentumSwing => "MOMENTUM SWING",
            Self::SwingBuild => "SWING BUILD",
            Self::PullbackWatch => "PULLBACK WATCH",
            Self::Watch => "WATCH",
            Self::Wait => "WAIT",
        };
        f.write_str(s)
    }
}

/// Setup plus the suggested entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub kind: SetupKind,
    pub entry: f64,
}

/// Name the setup for `entry_score` on the latest 1h bar.
pub fn setup_for(entry_score: u8, h1: &EnrichedBar) -> Setup {
    let close = h1.close();
    let above_high = h1.high_20.is_some_and(|high| close >= high);
    let volume_shock = h1.volume_sma.is_some_and(|sma| h1.bar.volume > 2.0 * sma);

    let (kind, entry) = if entry_score >= 8 {
        if volume_shock && above_high {
            (SetupKind::RocketLaunch, close)
        } else if above_high {
            (SetupKind::RangeBreak, close)
        } else if h1.rsi.is_some_and(|rsi| rsi > 60.0) {
            (SetupKind::MomentumSwing, close)
        } else {
            (SetupKind::SwingBuild, h1.ema20)
        }
    } else if entry_score >= 5 {
        if close < h1.ema20 && close > h1.ema50 {
            (SetupKind::PullbackWatch, h1.ema50)
        } else {
            (SetupKind::Watch, close)
        }
    } else {
        (SetupKind::Wait, close)
    };

    Setup { kind, entry }
}

// ============================================================================
// Trade Plan
// ============================================================================

/// Reward multiple of risk for the target.
const REWARD_MULTIPLE: f64 = 2.0;

/// Stop, target and odds for a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub price: f64,
    pub stop: f64,
    pub target: f64,
    pub risk: f64,
    /// Highest daily high of the last five sessions
    pub break_level: Option<f64>,
    /// Heuristic win probability in percent
    pub probability_pct: f64,
    /// Expected value per trade in percent of price: target gain weighted by
    /// the probability minus the stop loss weighted by its complement
    pub expected_value_pct: f64,
}

fn probability_for(entry_score: u8) -> f64 {
    match entry_score {
        10.. => 82.0,
        9 => 78.0,
        _ => 72.0,
    }
}

/// Plan a trade off the latest 1h bar, with the daily series for the break level.
///
/// The stop is the 1h EMA20; when that sits above price, 1 % of price is
/// used as the risk instead.
pub fn trade_plan(entry_score: u8, h1: &EnrichedBar, daily: &[Bar]) -> TradePlan {
    let price = h1.close();
    let stop = h1.ema20;
    let mut risk = price - stop;
    if risk <= 0.0 {
        risk = price * 0.01;
    }
    let target = price + REWARD_MULTIPLE * risk;

    let break_level = daily
        .iter()
        .rev()
        .take(5)
        .map(|b| b.high)
        .fold(None, |acc: Option<f64>, h| Some(acc.map_or(h, |a| a.max(h))));

    let probability_pct = probability_for(entry_score);
    let p = probability_pct / 100.0;
    let expected_value_pct = if price > 0.0 {
        let win_pct = (target - price) / price;
        let loss_pct = (price - stop) / price;
        (win_pct * p - loss_pct * (1.0 - p)) * 100.0
    } else {
        0.0
    };

    TradePlan {
        price,
        stop,
        target,
        risk,
        break_level,
        probability_pct,
        expected_value_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn h1(close: f64, ema20: f64, ema50: f64) -> EnrichedBar {
        EnrichedBar {
            bar: Bar::new(Utc::now(), close, close, close, close, 1000.0),
            ema9: close,
            ema20,
            ema50,
            ema200: ema50,
            rsi: Some(55.0),
            macd: 0.0,
            macd_signal: 0.0,
            true_range: None,
            atr: None,
            chop: 50.0,
            volume_sma: Some(1000.0),
            high_20: Some(close + 10.0),
        }
    }

    #[test]
    fn test_setup_kinds() {
        let mut bar = h1(100.0, 95.0, 90.0);
        bar.high_20 = Some(100.0);
        bar.bar.volume = 2500.0;
        assert_eq!(setup_for(8, &bar).kind, SetupKind::RocketLaunch);

        bar.bar.volume = 1500.0;
        assert_eq!(setup_for(8, &bar).kind, SetupKind::RangeBreak);

        let mut bar = h1(100.0, 95.0, 90.0);
        bar.rsi = Some(65.0);
        assert_eq!(setup_for(9, &bar).kind, SetupKind::MomentumSwing);

        let bar = h1(100.0, 95.0, 90.0);
        let setup = setup_for(8, &bar);
        assert_eq!(setup.kind, SetupKind::SwingBuild);
        assert_eq!(setup.entry, 95.0);

        let bar = h1(100.0, 105.0, 90.0);
        let setup = setup_for(6, &bar);
        assert_eq!(setup.kind, SetupKind::PullbackWatch);
        assert_eq!(setup.entry, 90.0);

        assert_eq!(setup_for(6, &h1(100.0, 95.0, 90.0)).kind, SetupKind::Watch);
        assert_eq!(setup_for(3, &h1(100.0, 95.0, 90.0)).kind, SetupKind::Wait);
    }

    #[test]
    fn test_trade_plan() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let daily: Vec<Bar> = (0..10)
            .map(|i| {
                let high = if i == 7 { 130.0 } else { 101.0 };
                Bar::new(start + Duration::days(i), 100.0, high, 99.0, 100.0, 1.0)
            })
            .collect();

        let plan = trade_plan(9, &h1(100.0, 95.0, 90.0), &daily);
        assert_eq!(plan.risk, 5.0);
        assert_eq!(plan.target, 110.0);
        assert_eq!(plan.break_level, Some(130.0));
        assert_eq!(plan.probability_pct, 78.0);
        // win 10 %, loss 5 %
        assert!((plan.expected_value_pct - (10.0 * 0.78 - 5.0 * 0.22)).abs() < 1e-9);
    }

    #[test]
    fn test_trade_plan_stop_above_price() {
        let plan = trade_plan(10, &h1(100.0, 104.0, 90.0), &[]);
        assert_eq!(plan.risk, 1.0);
        assert_eq!(plan.target, 102.0);
        assert_eq!(plan.break_level, None);
        assert_eq!(plan.probability_pct, 82.0);
    }
}
