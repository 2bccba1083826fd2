//! SQLite record store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::PersistenceStore;
use crate::portfolio::Position;
use crate::scanner::ScanResult;
use crate::watchlist::WatchlistRecord;

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- Positions; a symbol may have closed and open rows
CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    record_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_positions_symbol ON positions(symbol);

-- Watchlist ledger
CREATE TABLE IF NOT EXISTS watchlist (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL UNIQUE,
    record_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Latest scan results
CREATE TABLE IF NOT EXISTS scan_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL UNIQUE,
    record_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

#[derive(Debug, Clone, Copy)]
enum Table {
    Positions,
    Watchlist,
    ScanResults,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Self::Positions => "positions",
            Self::Watchlist => "watchlist",
            Self::ScanResults => "scan_results",
        }
    }
}

/// Record store backed by one SQLite file.
pub struct SqliteStore {
    /// rusqlite::Connection is Send but not Sync
    db: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open record database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set database pragmas")?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .context("Failed to create database tables")?;

        info!(db_path = %path.display(), "Initialized record store");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_all<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>> {
        let db = self.db.lock().await;

        let mut stmt = db.prepare(&format!(
            "SELECT symbol, record_json FROM {} ORDER BY id",
            table.name()
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (symbol, json) in rows {
            match serde_json::from_str(&json) {
                Ok(record) => records.push(record),
                Err(e) => warn!(table = table.name(), symbol = %symbol, error = %e, "Skipping undecodable row"),
            }
        }
        Ok(records)
    }

    async fn replace_all<T: Serialize>(
        &self,
        table: Table,
        items: &[T],
        symbol_of: impl Fn(&T) -> &str,
    ) -> Result<()> {
        let mut db = self.db.lock().await;
        let now = Utc::now().to_rfc3339();

        let tx = db.transaction()?;
        tx.execute(&format!("DELETE FROM {}", table.name()), [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {} (symbol, record_json, updated_at) VALUES (?1, ?2, ?3)",
                table.name()
            ))?;
            for item in items {
                let json = serde_json::to_string(item)?;
                stmt.execute(params![symbol_of(item), json, now])?;
            }
        }
        tx.commit()
            .with_context(|| format!("Failed to replace {}", table.name()))?;

        debug!(table = table.name(), count = items.len(), "Replaced records");
        Ok(())
    }
}

#[async_trait]
impl PersistenceStore for SqliteStore {
    async fn load_positions(&self) -> Result<Vec<Position>> {
        self.load_all(Table::Positions).await
    }

    async fn save_positions(&self, positions: &[Position]) -> Result<()> {
        self.replace_all(Table::Positions, positions, |p| p.symbol.as_str()).await
    }

    async fn load_watchlist(&self) -> Result<Vec<WatchlistRecord>> {
        self.load_all(Table::Watchlist).await
    }

    async fn save_watchlist(&self, records: &[WatchlistRecord]) -> Result<()> {
        self.replace_all(Table::Watchlist, records, |r| r.symbol.as_str()).await
    }

    async fn load_scan_results(&self) -> Result<Vec<ScanResult>> {
        self.load_all(Table::ScanResults).await
    }

    async fn save_scan_results(&self, results: &[ScanResult]) -> Result<()> {
        self.replace_all(Table::ScanResults, results, |r| r.symbol.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::report::tests::result;
    use crate::analysis::scoring::Confidence;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_positions_replace_all() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("nested/records.db")).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();

        store
            .save_positions(&[
                Position::open("AAA", 10.0, 5, day),
                Position::open("AAA", 12.0, 5, day),
                Position::open("BBB", 20.0, 1, day),
            ])
            .await
            .unwrap();
        assert_eq!(store.load_positions().await.unwrap().len(), 3);

        store.save_positions(&[Position::open("CCC", 1.0, 1, day)]).await.unwrap();
        let loaded = store.load_positions().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].symbol, "CCC");
    }

    #[tokio::test]
    async fn test_scan_results_roundtrip_order() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("records.db")).unwrap();
        let results = vec![
            result("ZED", 9, Confidence::High, 10.0),
            result("ABC", 7, Confidence::Low, 20.0),
        ];

        store.save_scan_results(&results).await.unwrap();
        assert_eq!(store.load_scan_results().await.unwrap(), results);
    }

    #[tokio::test]
    async fn test_undecodable_row_skipped() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("records.db")).unwrap();
        {
            let db = store.db.lock().await;
            db.execute(
                "INSERT INTO watchlist (symbol, record_json, updated_at) VALUES ('BAD', '{not json', '')",
                [],
            )
            .unwrap();
        }
        assert!(store.load_watchlist().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_keeps_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .save_scan_results(&[result("KEEP", 8, Confidence::High, 5.0)])
                .await
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_scan_results().await.unwrap()[0].symbol, "KEEP");
        assert_eq!(store.path(), path.as_path());
    }
}
