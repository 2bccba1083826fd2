//! Swing Scanner Library
//!
//! Multi-timeframe (15m / 1h / 1d) swing scanning for an equity universe.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                        ScanOrchestrator                             │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐             │
//! │  │ SeriesCache  │→ │  Indicators  │→ │   Scoring    │             │
//! │  │ (mem + disk) │  │   pipeline   │  │  + Ranking   │             │
//! │  └──────┬───────┘  └──────────────┘  └──────┬───────┘             │
//! │         │                                   ↓                      │
//! │  ┌──────┴───────┐  ┌──────────────┐  ┌──────────────┐             │
//! │  │ Resilient    │  │  Snapshot    │  │  Watchlist   │             │
//! │  │ DataSource   │  │  publisher   │  │  ledger      │             │
//! │  └──────────────┘  └──────────────┘  └──────────────┘             │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Scores
//! - **EntryScore** (0-10): trend alignment, RSI regime, volume, structure
//!   (choppiness) and MACD momentum on the latest bars.
//! - **WeaknessScore** (0-10): broken trend, fading momentum, distribution
//!   volume and down closes. Drives SELL SIGNAL tags and watchlist exits.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analysis;
pub mod data;
pub mod notification;
pub mod portfolio;
pub mod scanner;
pub mod store;
pub mod universe;
pub mod watchlist;

pub use scanner::{ScanMode, ScanOrchestrator, ScanReport};
