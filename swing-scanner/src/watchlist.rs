//! Watchlist ledger.
//!
//! A bounded, day-limited list of strong candidates. Records are never
//! deleted; each update only transitions them between ACTIVE,
//! OPEN_POSITION and INACTIVE.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use swing_common::WatchlistConfig;
use tracing::{debug, info};

/// Record state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchStatus {
    Active,
    OpenPosition,
    Inactive,
}

/// Why a record went INACTIVE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Weakness score reached the exit threshold
    Weakness,
    /// Entry score decayed below the keep threshold
    ScoreDecay,
    /// Pushed out by the ACTIVE cap
    Overflow,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Weakness => "weakness",
            Self::ScoreDecay => "score_decay",
            Self::Overflow => "overflow",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistRecord {
    pub symbol: String,
    pub status: WatchStatus,
    pub added_date: NaiveDate,
    pub last_updated: DateTime<Utc>,
    pub price: f64,
    pub current_score: u8,
    pub max_score_seen: u8,
    #[serde(default)]
    pub weakness_score: u8,
    #[serde(default)]
    pub exit_reason: Option<ExitReason>,
    #[serde(default = "default_days_tracked")]
    pub days_tracked: i64,
}

fn default_days_tracked() -> i64 {
    1
}

impl WatchlistRecord {
    fn admit(candidate: &Candidate, today: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            symbol: candidate.symbol.clone(),
            status: WatchStatus::Active,
            added_date: today,
            last_updated: now,
            price: candidate.price,
            current_score: candidate.score,
            max_score_seen: candidate.score,
            weakness_score: candidate.weakness,
            exit_reason: None,
            days_tracked: 1,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WatchStatus::Active
    }

    fn set_status(&mut self, status: WatchStatus, reason: Option<ExitReason>) {
        if status == WatchStatus::Active && self.status != WatchStatus::Active {
            self.exit_reason = None;
        }
        self.status = status;
        if reason.is_some() {
            self.exit_reason = reason;
        }
    }
}

/// Scored symbol offered to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub symbol: String,
    pub score: u8,
    pub weakness: u8,
    pub price: f64,
}

/// Outcome of one ledger update.
#[derive(Debug, Clone, Default)]
pub struct WatchlistUpdate {
    /// Every record, in ledger order
    pub records: Vec<WatchlistRecord>,
    /// Symbols admitted in this update
    pub admitted: Vec<String>,
    /// Symbols demoted by the ACTIVE cap
    pub overflowed: Vec<String>,
}

/// Owns the watchlist records between loads and saves.
#[derive(Debug, Clone)]
pub struct WatchlistLedger {
    config: WatchlistConfig,
    records: Vec<WatchlistRecord>,
    index: HashMap<String, usize>,
}

impl WatchlistLedger {
    pub fn new(config: WatchlistConfig, records: Vec<WatchlistRecord>) -> Self {
        let mut ledger = Self {
            config,
            records: Vec::with_capacity(records.len()),
            index: HashMap::new(),
        };
        for record in records {
            // later duplicates replace earlier ones
            match ledger.index.get(&record.symbol) {
                Some(&i) => ledger.records[i] = record,
                None => ledger.push(record),
            }
        }
        ledger
    }

    fn push(&mut self, record: WatchlistRecord) {
        self.index.insert(record.symbol.clone(), self.records.len());
        self.records.push(record);
    }

    pub fn records(&self) -> &[WatchlistRecord] {
        &self.records
    }

    pub fn get(&self, symbol: &str) -> Option<&WatchlistRecord> {
        self.index.get(symbol).map(|&i| &self.records[i])
    }

    /// Symbols currently ACTIVE.
    pub fn active_symbols(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.symbol.clone())
            .collect()
    }

    /// Apply one scan's candidates.
    pub fn update(
        &mut self,
        candidates: &[Candidate],
        open_positions: &HashSet<String>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> WatchlistUpdate {
        let mut eligible: Vec<&Candidate> = Vec::new();

        for candidate in candidates {
            match self.index.get(&candidate.symbol).copied() {
                Some(i) => self.refresh(i, candidate, open_positions, today, now),
                None if candidate.score >= self.config.admission_score => eligible.push(candidate),
                None => {}
            }
        }

        let admitted = self.admit(eligible, today, now);
        let overflowed = self.enforce_cap(now);

        WatchlistUpdate {
            records: self.records.clone(),
            admitted,
            overflowed,
        }
    }

    fn refresh(
        &mut self,
        i: usize,
        candidate: &Candidate,
        open_positions: &HashSet<String>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) {
        let config = &self.config;
        let record = &mut self.records[i];

        record.current_score = candidate.score;
        record.price = candidate.price;
        record.weakness_score = candidate.weakness;
        record.max_score_seen = record.max_score_seen.max(candidate.score);
        record.last_updated = now;
        record.days_tracked = (today - record.added_date).num_days() + 1;

        if open_positions.contains(&record.symbol) {
            record.set_status(WatchStatus::OpenPosition, None);
        } else if candidate.weakness >= config.weakness_exit {
            record.set_status(WatchStatus::Inactive, Some(ExitReason::Weakness));
        } else if candidate.score < config.decay_score {
            record.set_status(WatchStatus::Inactive, Some(ExitReason::ScoreDecay));
        } else if candidate.score >= config.admission_score
            || record.status == WatchStatus::OpenPosition
        {
            record.set_status(WatchStatus::Active, None);
        }

        debug!(symbol = %record.symbol, status = ?record.status, score = candidate.score, "Watchlist record refreshed");
    }

    fn admit(&mut self, mut eligible: Vec<&Candidate>, today: NaiveDate, now: DateTime<Utc>) -> Vec<String> {
        if eligible.is_empty() {
            return Vec::new();
        }

        eligible.sort_by(|a, b| b.score.cmp(&a.score).then(a.price.total_cmp(&b.price)));

        let admitted_today = self
            .records
            .iter()
            .filter(|r| {
                r.added_date == today
                    && matches!(r.status, WatchStatus::Active | WatchStatus::OpenPosition)
            })
            .count();
        let slots = self.config.daily_quota.saturating_sub(admitted_today);

        info!(
            candidates = eligible.len(),
            slots,
            admitting = eligible.len().min(slots),
            "Watchlist admissions"
        );

        eligible
            .into_iter()
            .take(slots)
            .map(|candidate| {
                self.push(WatchlistRecord::admit(candidate, today, now));
                candidate.symbol.clone()
            })
            .collect()
    }

    fn enforce_cap(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut active: Vec<usize> = (0..self.records.len())
            .filter(|&i| self.records[i].is_active())
            .collect();
        if active.len() <= self.config.active_cap {
            return Vec::new();
        }

        // stable: equal scores keep ledger order
        active.sort_by(|&a, &b| self.records[b].current_score.cmp(&self.records[a].current_score));

        let overflowed: Vec<String> = active[self.config.active_cap..]
            .iter()
            .map(|&i| {
                let record = &mut self.records[i];
                record.set_status(WatchStatus::Inactive, Some(ExitReason::Overflow));
                record.last_updated = now;
                record.symbol.clone()
            })
            .collect();

        info!(demoted = overflowed.len(), cap = self.config.active_cap, "Watchlist cap enforced");
        overflowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn candidate(symbol: &str, score: u8, weakness: u8, price: f64) -> Candidate {
        Candidate {
            symbol: symbol.to_string(),
            score,
            weakness,
            price,
        }
    }

    fn record(symbol: &str, status: WatchStatus, added: NaiveDate, score: u8) -> WatchlistRecord {
        WatchlistRecord {
            symbol: symbol.to_string(),
            status,
            added_date: added,
            last_updated: Utc::now(),
            price: 100.0,
            current_score: score,
            max_score_seen: score,
            weakness_score: 0,
            exit_reason: None,
            days_tracked: 1,
        }
    }

    #[test]
    fn test_daily_quota_orders_by_score_then_price() {
        let mut ledger = WatchlistLedger::new(WatchlistConfig::default(), vec![]);
        let candidates = vec![
            candidate("A", 8, 0, 50.0),
            candidate("B", 9, 0, 300.0),
            candidate("C", 8, 0, 20.0),
            candidate("D", 10, 0, 500.0),
            candidate("E", 8, 0, 900.0),
            candidate("F", 9, 0, 100.0),
            candidate("G", 8, 0, 40.0),
            candidate("LOW", 7, 0, 1.0),
        ];

        let update = ledger.update(&candidates, &HashSet::new(), today(), Utc::now());

        assert_eq!(update.admitted, vec!["D", "F", "B", "C", "G"]);
        assert_eq!(update.records.len(), 5);
        assert!(ledger.get("A").is_none());
        assert!(ledger.get("E").is_none());
        assert!(ledger.get("LOW").is_none());
        assert!(update.records.iter().all(|r| r.status == WatchStatus::Active));
    }

    #[test]
    fn test_quota_counts_todays_admissions() {
        let existing = vec![
            record("X", WatchStatus::Active, today(), 9),
            record("Y", WatchStatus::OpenPosition, today(), 9),
            record("Z", WatchStatus::Inactive, today(), 9),
        ];
        let mut ledger = WatchlistLedger::new(WatchlistConfig::default(), existing);
        let candidates: Vec<_> = (0..5).map(|i| candidate(&format!("N{i}"), 9, 0, 10.0 + i as f64)).collect();

        let update = ledger.update(&candidates, &HashSet::new(), today(), Utc::now());
        assert_eq!(update.admitted, vec!["N0", "N1", "N2"]);
    }

    #[test]
    fn test_active_cap_demotes_overflow() {
        let existing: Vec<_> = (0..60)
            .map(|i| record(&format!("S{i:02}"), WatchStatus::Active, today().pred_opt().unwrap(), (i % 10) as u8))
            .chain(std::iter::once(record("HELD", WatchStatus::OpenPosition, today(), 1)))
            .collect();
        let mut ledger = WatchlistLedger::new(WatchlistConfig::default(), existing);

        let update = ledger.update(&[], &HashSet::new(), today(), Utc::now());

        assert_eq!(update.overflowed.len(), 10);
        let active = update.records.iter().filter(|r| r.is_active()).count();
        assert_eq!(active, 50);
        let overflow: Vec<_> = update
            .records
            .iter()
            .filter(|r| r.exit_reason == Some(ExitReason::Overflow))
            .collect();
        assert_eq!(overflow.len(), 10);
        assert!(overflow.iter().all(|r| r.status == WatchStatus::Inactive && r.current_score <= 1));
        assert_eq!(ledger.get("HELD").unwrap().status, WatchStatus::OpenPosition);
        assert_eq!(update.records.len(), 61);
    }

    #[test]
    fn test_status_precedence() {
        let yesterday = today().pred_opt().unwrap();
        let existing = vec![
            record("HELD", WatchStatus::Active, yesterday, 9),
            record("WEAK", WatchStatus::Active, yesterday, 9),
            record("DECAY", WatchStatus::Active, yesterday, 9),
            record("MID", WatchStatus::Inactive, yesterday, 4),
        ];
        let mut ledger = WatchlistLedger::new(WatchlistConfig::default(), existing);
        let held: HashSet<String> = ["HELD".to_string()].into();
        let candidates = vec![
            candidate("HELD", 2, 9, 90.0),
            candidate("WEAK", 9, 7, 90.0),
            candidate("DECAY", 4, 0, 90.0),
            candidate("MID", 6, 0, 90.0),
        ];

        ledger.update(&candidates, &held, today(), Utc::now());

        assert_eq!(ledger.get("HELD").unwrap().status, WatchStatus::OpenPosition);
        let weak = ledger.get("WEAK").unwrap();
        assert_eq!(weak.status, WatchStatus::Inactive);
        assert_eq!(weak.exit_reason, Some(ExitReason::Weakness));
        assert_eq!(ledger.get("DECAY").unwrap().exit_reason, Some(ExitReason::ScoreDecay));
        // no rule fires: unchanged
        assert_eq!(ledger.get("MID").unwrap().status, WatchStatus::Inactive);
        assert_eq!(ledger.get("MID").unwrap().days_tracked, 2);
    }

    #[test]
    fn test_reactivation_clears_reason_and_tracks_max() {
        let mut old = record("R", WatchStatus::Inactive, today(), 9);
        old.exit_reason = Some(ExitReason::ScoreDecay);
        let mut ledger = WatchlistLedger::new(WatchlistConfig::default(), vec![old]);

        ledger.update(&[candidate("R", 10, 1, 55.0)], &HashSet::new(), today(), Utc::now());
        let r = ledger.get("R").unwrap();
        assert_eq!(r.status, WatchStatus::Active);
        assert_eq!(r.exit_reason, None);
        assert_eq!(r.max_score_seen, 10);

        ledger.update(&[candidate("R", 6, 1, 50.0)], &HashSet::new(), today(), Utc::now());
        let r = ledger.get("R").unwrap();
        assert_eq!(r.max_score_seen, 10);
        assert_eq!(r.current_score, 6);
        assert_eq!(r.price, 50.0);
    }

    #[test]
    fn test_closed_position_returns_to_active() {
        let existing = vec![record("P", WatchStatus::OpenPosition, today(), 9)];
        let mut ledger = WatchlistLedger::new(WatchlistConfig::default(), existing);

        ledger.update(&[candidate("P", 6, 2, 10.0)], &HashSet::new(), today(), Utc::now());
        assert_eq!(ledger.get("P").unwrap().status, WatchStatus::Active);
    }
}
