//! In-process store, used by tests and dry runs.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::PersistenceStore;
use crate::portfolio::Position;
use crate::scanner::ScanResult;
use crate::watchlist::WatchlistRecord;

#[derive(Debug, Default)]
pub struct MemoryStore {
    positions: RwLock<Vec<Position>>,
    watchlist: RwLock<Vec<WatchlistRecord>>,
    results: RwLock<Vec<ScanResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_positions(positions: Vec<Position>) -> Self {
        Self {
            positions: RwLock::new(positions),
            ..Self::default()
        }
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn load_positions(&self) -> Result<Vec<Position>> {
        Ok(self.positions.read().await.clone())
    }

    async fn save_positions(&self, positions: &[Position]) -> Result<()> {
        *self.positions.write().await = positions.to_vec();
        Ok(())
    }

    async fn load_watchlist(&self) -> Result<Vec<WatchlistRecord>> {
        Ok(self.watchlist.read().await.clone())
    }

    async fn save_watchlist(&self, records: &[WatchlistRecord]) -> Result<()> {
        *self.watchlist.write().await = records.to_vec();
        Ok(())
    }

    async fn load_scan_results(&self) -> Result<Vec<ScanResult>> {
        Ok(self.results.read().await.clone())
    }

    async fn save_scan_results(&self, results: &[ScanResult]) -> Result<()> {
        *self.results.write().await = results.to_vec();
        Ok(())
    }
}
