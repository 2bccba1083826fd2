//! Record persistence.
//!
//! Positions, watchlist records and the latest scan results are stored as
//! whole collections keyed by symbol: callers read everything and replace
//! everything.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::portfolio::Position;
use crate::scanner::ScanResult;
use crate::watchlist::WatchlistRecord;

/// Get-all / replace-all record store.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn load_positions(&self) -> Result<Vec<Position>>;

    async fn save_positions(&self, positions: &[Position]) -> Result<()>;

    async fn load_watchlist(&self) -> Result<Vec<WatchlistRecord>>;

    async fn save_watchlist(&self, records: &[WatchlistRecord]) -> Result<()>;

    async fn load_scan_results(&self) -> Result<Vec<ScanResult>>;

    async fn save_scan_results(&self, results: &[ScanResult]) -> Result<()>;
}
