//! Phased scan orchestration.

pub mod orchestrator;
pub mod report;
pub mod status;

pub use orchestrator::{score_symbol, ScanOrchestrator, PORTFOLIO_FILE};
pub use report::{sort_results, ScanMode, ScanReport, ScanResult, SkipReason, SkippedSymbol};
pub use status::{JobState, JobStatus, ProgressTracker, StatusWriter};
