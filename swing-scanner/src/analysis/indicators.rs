//! Indicator pipeline.
//!
//! `enrich` takes a bar series and returns a new series of [`EnrichedBar`]s.
//! The input is never modified.
//!
//! | Field         | Definition                                                    |
//! |---------------|---------------------------------------------------------------|
//! | `ema{9,20,50,200}` | recursive EMA, `alpha = 2 / (span + 1)`, seeded with the first close |
//! | `rsi`         | 100 - 100 / (1 + mean gain / mean loss) over 14 changes, simple means |
//! | `macd`        | EMA12 - EMA26, `macd_signal` = EMA9 of `macd`                 |
//! | `true_range`  | max(H - L, abs(H - prevC), abs(L - prevC))                    |
//! | `atr`         | rolling mean of 14 true ranges                                |
//! | `chop`        | 100 * log10(sum TR / (max H - min L)) / log10(14) over 14 bars, else 50 |
//! | `volume_sma`  | rolling mean of 20 volumes                                    |
//! | `high_20`     | rolling max of 20 highs                                       |
//!
//! Rolling fields are `None` until their window is full. `chop` is always a
//! finite value in [0, 100]; the neutral 50 stands in whenever it cannot be
//! computed.

use serde::{Deserialize, Serialize};

use crate::data::Bar;

pub const RSI_WINDOW: usize = 14;
pub const ATR_WINDOW: usize = 14;
pub const CHOP_WINDOW: usize = 14;
pub const VOLUME_WINDOW: usize = 20;
pub const HIGH_WINDOW: usize = 20;

/// Bars needed before every rolling field used in scoring is defined.
pub const MIN_SCORING_BARS: usize = VOLUME_WINDOW;

/// Choppiness reported when it cannot be computed.
pub const NEUTRAL_CHOP: f64 = 50.0;

/// A bar with its derived indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    pub bar: Bar,
    pub ema9: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub ema200: f64,
    pub rsi: Option<f64>,
    pub macd: f64,
    pub macd_signal: f64,
    pub true_range: Option<f64>,
    pub atr: Option<f64>,
    pub chop: f64,
    pub volume_sma: Option<f64>,
    pub high_20: Option<f64>,
}

impl EnrichedBar {
    pub fn close(&self) -> f64 {
        self.bar.close
    }

    pub fn macd_bullish(&self) -> bool {
        self.macd > self.macd_signal
    }

    /// RSI and volume SMA are both defined.
    pub fn is_scoring_ready(&self) -> bool {
        self.rsi.is_some() && self.volume_sma.is_some()
    }
}

// ============================================================================
// Primitive Series Operations
// ============================================================================

/// Recursive EMA with `alpha = 2 / (span + 1)`, seeded with `values[0]`.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Rolling mean over `window` values; `None` until the window holds only
/// defined values.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

fn rolling_sum(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().sum())
}

fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let wrapped: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    rolling(&wrapped, window, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let wrapped: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    rolling(&wrapped, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

fn rolling(values: &[Option<f64>], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if window == 0 || i + 1 < window {
            out.push(None);
            continue;
        }
        let slice: Option<Vec<f64>> = values[i + 1 - window..=i].iter().copied().collect();
        out.push(slice.map(|w| f(&w)));
    }
    out
}

/// RSI over simple rolling means of gains and losses.
///
/// The first bar has no change, so the first value appears once `window`
/// real changes exist (index `window`). A window without any movement is
/// undefined; one without losses is 100.
pub fn rsi(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let deltas: Vec<Option<f64>> = (0..closes.len())
        .map(|i| i.checked_sub(1).map(|prev| closes[i] - closes[prev]))
        .collect();
    let gains: Vec<Option<f64>> = deltas.iter().map(|d| d.map(|d| d.max(0.0))).collect();
    let losses: Vec<Option<f64>> = deltas.iter().map(|d| d.map(|d| (-d).max(0.0))).collect();

    let avg_gain = rolling_mean(&gains, window);
    let avg_loss = rolling_mean(&losses, window);

    avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) if l > 0.0 => Some(100.0 - 100.0 / (1.0 + g / l)),
            (Some(g), Some(_)) if g > 0.0 => Some(100.0),
            _ => None,
        })
        .collect()
}

/// True range per bar; undefined on the first bar (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<Option<f64>> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let prev_close = bars.get(i.checked_sub(1)?)?.close;
            let hl = bar.high - bar.low;
            let hc = (bar.high - prev_close).abs();
            let lc = (bar.low - prev_close).abs();
            Some(hl.max(hc).max(lc))
        })
        .collect()
}

/// Choppiness index, substituting [`NEUTRAL_CHOP`] wherever it is undefined.
pub fn choppiness(bars: &[Bar], tr: &[Option<f64>], window: usize) -> Vec<f64> {
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let tr_sum = rolling_sum(tr, window);
    let max_high = rolling_max(&highs, window);
    let min_low = rolling_min(&lows, window);
    let log_window = (window as f64).log10();

    (0..bars.len())
        .map(|i| {
            let (Some(sum), Some(hi), Some(lo)) = (tr_sum[i], max_high[i], min_low[i]) else {
                return NEUTRAL_CHOP;
            };
            let range = hi - lo;
            if range == 0.0 {
                return NEUTRAL_CHOP;
            }
            let value = 100.0 * (sum / range).log10() / log_window;
            if value.is_finite() {
                value.clamp(0.0, 100.0)
            } else {
                NEUTRAL_CHOP
            }
        })
        .collect()
}

// ============================================================================
// Pipeline
// ============================================================================

/// Derive indicators for `bars`. Returns `None` for an empty series.
pub fn enrich(bars: &[Bar]) -> Option<Vec<EnrichedBar>> {
    if bars.is_empty() {
        return None;
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.volume)).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();

    let ema9 = ema(&closes, 9);
    let ema20 = ema(&closes, 20);
    let ema50 = ema(&closes, 50);
    let ema200 = ema(&closes, 200);
    let ema12 = ema(&closes, 12);
    let ema26 = ema(&closes, 26);
    let macd: Vec<f64> = ema12.iter().zip(&ema26).map(|(a, b)| a - b).collect();
    let macd_signal = ema(&macd, 9);
    let rsi = rsi(&closes, RSI_WINDOW);
    let tr = true_range(bars);
    let atr = rolling_mean(&tr, ATR_WINDOW);
    let chop = choppiness(bars, &tr, CHOP_WINDOW);
    let volume_sma = rolling_mean(&volumes, VOLUME_WINDOW);
    let high_20 = rolling_max(&highs, HIGH_WINDOW);

    Some(
        bars.iter()
            .enumerate()
            .map(|(i, bar)| EnrichedBar {
                bar: bar.clone(),
                ema9: ema9[i],
                ema20: ema20[i],
                ema50: ema50[i],
                ema200: ema200[i],
                rsi: rsi[i],
                macd: macd[i],
                macd_signal: macd_signal[i],
                true_range: tr[i],
                atr: atr[i],
                chop: chop[i],
                volume_sma: volume_sma[i],
                high_20: high_20[i],
            })
            .collect(),
    )
}

/// Latest enriched bar of `bars`, if any.
pub fn enrich_latest(bars: &[Bar]) -> Option<EnrichedBar> {
    enrich(bars)?.pop()
}
