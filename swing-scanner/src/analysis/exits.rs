//! Exit waterfall for open positions.
//!
//! Rules are checked in order on the latest 1h bar; the first match wins:
//!
//! | Rule                 | Action       |
//! |----------------------|--------------|
//! | RSI > 75             | BOOK PROFIT  |
//! | gain > 15 %          | BOOK PARTIAL |
//! | close < EMA9         | TRAIL EXIT   |
//! | close < EMA20        | HARD EXIT    |
//! | otherwise            | HOLD         |

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::indicators::EnrichedBar;
use crate::portfolio::Position;

/// RSI above which profits are booked.
pub const OVERHEATED_RSI: f64 = 75.0;

/// Gain in percent above which a partial exit is suggested.
pub const PARTIAL_TARGET_PCT: f64 = 15.0;

/// Suggested action for an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitAction {
    BookProfit,
    BookPartial,
    TrailExit,
    HardExit,
    Hold,
}

impl ExitAction {
    /// Whether the action asks the holder to do something.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Self::Hold)
    }
}

impl fmt::Display for ExitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BookProfit => "BOOK PROFIT",
            Self::BookPartial => "BOOK PARTIAL",
            Self::TrailExit => "TRAIL EXIT",
            Self::HardExit => "HARD EXIT",
            Self::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

/// Outcome of the waterfall for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSignal {
    pub symbol: String,
    pub entry_price: f64,
    pub current_price: f64,
    pub pnl_percent: f64,
    pub action: ExitAction,
    pub reason: String,
    pub days_held: i64,
    pub rsi: Option<f64>,
    pub ema9: f64,
}

/// Run the waterfall for `position` against the latest 1h bar.
pub fn evaluate_exit(position: &Position, latest_h1: &EnrichedBar, today: NaiveDate) -> ExitSignal {
    let close = latest_h1.close();
    let pnl_percent = position.pnl_percent(close);

    let (action, reason) = if latest_h1.rsi.is_some_and(|rsi| rsi > OVERHEATED_RSI) {
        (ExitAction::BookProfit, "RSI overheated (> 75)")
    } else if pnl_percent > PARTIAL_TARGET_PCT {
        (ExitAction::BookPartial, "Target hit (> 15%)")
    } else if close < latest_h1.ema9 {
        (ExitAction::TrailExit, "Lost momentum (< EMA9)")
    } else if close < latest_h1.ema20 {
        (ExitAction::HardExit, "Trend broken (< EMA20)")
    } else {
        (ExitAction::Hold, "Trend intact")
    };

    ExitSignal {
        symbol: position.symbol.clone(),
        entry_price: position.entry_price,
        current_price: close,
        pnl_percent,
        action,
        reason: reason.to_string(),
        days_held: position.days_held(today),
        rsi: latest_h1.rsi,
        ema9: latest_h1.ema9,
    }
}
