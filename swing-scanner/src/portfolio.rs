//! Open position records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Position lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// A position held (or formerly held) in a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub entry_price: f64,
    pub quantity: u32,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    pub status: PositionStatus,
    /// Entry score when the position was opened
    #[serde(default)]
    pub entry_score: Option<u8>,
    #[serde(default)]
    pub exit_price: Option<f64>,
    #[serde(default)]
    pub exit_date: Option<NaiveDate>,
}

impl Position {
    pub fn open(symbol: impl Into<String>, entry_price: f64, quantity: u32, entry_date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            entry_price,
            quantity,
            entry_date,
            stop_loss: None,
            status: PositionStatus::Open,
            entry_score: None,
            exit_price: None,
            exit_date: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Unrealized gain at `price`, in percent of entry.
    pub fn pnl_percent(&self, price: f64) -> f64 {
        if self.entry_price == 0.0 {
            0.0
        } else {
            (price - self.entry_price) / self.entry_price * 100.0
        }
    }

    /// Calendar days since entry.
    pub fn days_held(&self, today: NaiveDate) -> i64 {
        (today - self.entry_date).num_days().max(0)
    }
}

/// Symbols of the open positions, in input order without duplicates.
pub fn open_symbols(positions: &[Position]) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for position in positions.iter().filter(|p| p.is_open()) {
        if !symbols.contains(&position.symbol) {
            symbols.push(position.symbol.clone());
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_pnl_and_days_held() {
        let position = Position::open("ABC", 200.0, 10, date(1));
        assert!((position.pnl_percent(230.0) - 15.0).abs() < 1e-9);
        assert_eq!(position.days_held(date(11)), 10);
    }

    #[test]
    fn test_open_symbols_dedup_and_filter() {
        let mut closed = Position::open("OLD", 10.0, 1, date(1));
        closed.status = PositionStatus::Closed;
        let positions = vec![
            Position::open("ABC", 1.0, 1, date(1)),
            closed,
            Position::open("ABC", 2.0, 1, date(2)),
            Position::open("XYZ", 3.0, 1, date(2)),
        ];
        assert_eq!(open_symbols(&positions), vec!["ABC", "XYZ"]);
    }
}
