//! Series merge: concatenate, normalize timestamps, dedupe keeping newest.

use chrono::{DateTime, FixedOffset, TimeZone, Timelike, Utc};
use std::collections::BTreeMap;

use super::{Bar, Timeframe};

/// Normalize a bar timestamp to the cache's single convention.
///
/// Intraday bars are truncated to the whole minute. Daily bars map to
/// midnight UTC of their calendar date on the exchange, so a provisional
/// daily bar stamped mid-session and the final bar for the same day share a
/// key.
pub fn normalize_timestamp(
    ts: DateTime<Utc>,
    timeframe: Timeframe,
    exchange_offset: FixedOffset,
) -> DateTime<Utc> {
    if timeframe.is_intraday() {
        return ts
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(ts);
    }

    let date = ts.with_timezone(&exchange_offset).date_naive();
    match date.and_hms_opt(0, 0, 0) {
        Some(midnight) => Utc.from_utc_datetime(&midnight),
        None => ts,
    }
}

/// Merge `fresh` bars over `existing`.
///
/// The result is sorted by timestamp with unique timestamps; on collision the
/// bar from `fresh` wins. Bars with non-finite fields are dropped. Merging
/// the same `fresh` slice twice yields the same series.
pub fn merge_bars(
    existing: &[Bar],
    fresh: &[Bar],
    timeframe: Timeframe,
    exchange_offset: FixedOffset,
) -> Vec<Bar> {
    let mut by_time: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();

    for bar in existing.iter().chain(fresh.iter()) {
        if !bar.is_finite() {
            continue;
        }
        let mut bar = bar.clone();
        bar.timestamp = normalize_timestamp(bar.timestamp, timeframe, exchange_offset);
        by_time.insert(bar.timestamp, bar);
    }

    by_time.into_values().collect()
}
