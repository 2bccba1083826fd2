//! Indicator pipeline, scoring model, ranking and exits.

pub mod exits;
pub mod indicators;
pub mod ranking;
pub mod scoring;
pub mod setup;

pub use exits::{evaluate_exit, ExitAction, ExitSignal};
pub use indicators::{enrich, enrich_latest, EnrichedBar};
pub use ranking::{quote_shortlist, rank_of, RankEntry, UniverseRanker, UNRANKED};
pub use scoring::{
    classify, daily_pre_score, entry_score, weakness_score, Classification, Confidence, Tag,
};
pub use setup::{setup_for, trade_plan, Setup, SetupKind, TradePlan};
