//! Per-timeframe snapshot publication.
//!
//! After a scan, every symbol's cached series for a timeframe is gathered into
//! one [`Snapshot`], written to a staging file, and copied atomically into the
//! path readers poll. A reader sees the previous snapshot or the new one,
//! never a partial file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use swing_common::fs::{copy_atomic, read_json, write_json_atomic};

use super::{Bar, SeriesStore, Timeframe};

/// Union of all symbols' series for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timeframe: Timeframe,
    pub generated_at: DateTime<Utc>,
    /// symbol → bars, oldest first
    pub series: BTreeMap<String, Vec<Bar>>,
}

impl Snapshot {
    pub fn symbol_count(&self) -> usize {
        self.series.len()
    }

    pub fn bar_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }
}

/// Builds and publishes snapshots under `cache_dir`.
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    root: PathBuf,
}

impl SnapshotPublisher {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            root: cache_dir.to_path_buf(),
        }
    }

    /// Path readers poll.
    pub fn live_path(&self, timeframe: Timeframe) -> PathBuf {
        self.root.join(format!("snapshot_{}.json", timeframe))
    }

    /// Path the snapshot is assembled at before publication.
    pub fn staging_path(&self, timeframe: Timeframe) -> PathBuf {
        self.root
            .join(".staging")
            .join(format!("snapshot_{}.json", timeframe))
    }

    /// Gather the stored series of `symbols` for `timeframe`.
    ///
    /// Symbols with no stored series are left out.
    pub fn aggregate(&self, store: &SeriesStore, timeframe: Timeframe, symbols: &[String]) -> Snapshot {
        let series = symbols
            .iter()
            .filter_map(|symbol| {
                let bars = store.load(symbol, timeframe)?;
                (!bars.is_empty()).then(|| (symbol.clone(), bars))
            })
            .collect();

        Snapshot {
            timeframe,
            generated_at: Utc::now(),
            series,
        }
    }

    /// Write `snapshot` to staging, then atomically replace the live file.
    pub fn publish(&self, snapshot: &Snapshot) -> swing_common::Result<PathBuf> {
        let staging = self.staging_path(snapshot.timeframe);
        let live = self.live_path(snapshot.timeframe);

        write_json_atomic(&staging, snapshot)?;
        copy_atomic(&staging, &live)?;

        info!(
            timeframe = %snapshot.timeframe,
            symbols = snapshot.symbol_count(),
            bars = snapshot.bar_count(),
            path = %live.display(),
            "Snapshot published"
        );
        Ok(live)
    }

    /// Aggregate and publish in one step.
    pub fn aggregate_and_publish(
        &self,
        store: &SeriesStore,
        timeframe: Timeframe,
        symbols: &[String],
    ) -> swing_common::Result<Snapshot> {
        let snapshot = self.aggregate(store, timeframe, symbols);
        self.publish(&snapshot)?;
        Ok(snapshot)
    }

    /// Read the currently published snapshot, if any.
    pub fn load(&self, timeframe: Timeframe) -> swing_common::Result<Option<Snapshot>> {
        read_json(&self.live_path(timeframe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn daily(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 1 + i as u32, 0, 0, 0).unwrap();
                Bar::new(ts, c, c, c, c, 1.0)
            })
            .collect()
    }

    #[test]
    fn test_aggregate_skips_missing_symbols() {
        let dir = TempDir::new().unwrap();
        let store = SeriesStore::new(dir.path());
        store.save("AAA", Timeframe::Daily, &daily(&[1.0, 2.0])).unwrap();
        store.save("BBB", Timeframe::Daily, &daily(&[3.0])).unwrap();

        let publisher = SnapshotPublisher::new(dir.path());
        let symbols = vec!["AAA".to_string(), "BBB".to_string(), "CCC".to_string()];
        let snapshot = publisher.aggregate(&store, Timeframe::Daily, &symbols);

        assert_eq!(snapshot.symbol_count(), 2);
        assert_eq!(snapshot.bar_count(), 3);
    }

    #[test]
    fn test_publish_replaces_live_file() {
        let dir = TempDir::new().unwrap();
        let store = SeriesStore::new(dir.path());
        let publisher = SnapshotPublisher::new(dir.path());
        let symbols = vec!["AAA".to_string()];

        store.save("AAA", Timeframe::H1, &daily(&[1.0])).unwrap();
        publisher
            .aggregate_and_publish(&store, Timeframe::H1, &symbols)
            .unwrap();

        store.save("AAA", Timeframe::H1, &daily(&[1.0, 2.0])).unwrap();
        publisher
            .aggregate_and_publish(&store, Timeframe::H1, &symbols)
            .unwrap();

        let live = publisher.load(Timeframe::H1).unwrap().unwrap();
        assert_eq!(live.series["AAA"].len(), 2);
        assert!(publisher.staging_path(Timeframe::H1).exists());
        assert!(publisher.live_path(Timeframe::H1).ends_with("snapshot_1h.json"));
    }

    #[test]
    fn test_readers_never_see_partial_snapshot() {
        let dir = TempDir::new().unwrap();
        let publisher = SnapshotPublisher::new(dir.path());
        let snapshot_of = |symbols: usize, bars: usize| Snapshot {
            timeframe: Timeframe::Daily,
            generated_at: Utc::now(),
            series: (0..symbols)
                .map(|i| (format!("SYM{i}"), daily(&vec![100.0; bars])))
                .collect(),
        };
        let small = snapshot_of(2, 3);
        let large = snapshot_of(40, 25);
        let live = publisher.live_path(Timeframe::Daily);

        let writer = {
            let publisher = publisher.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    let snapshot = if i % 2 == 0 { &large } else { &small };
                    publisher.publish(snapshot).unwrap();
                }
            })
        };

        while !writer.is_finished() {
            let bytes = match std::fs::read(&live) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => panic!("reading live snapshot: {e}"),
            };
            let snapshot: Snapshot = serde_json::from_slice(&bytes).expect("live snapshot is complete");
            assert!(matches!(snapshot.symbol_count(), 2 | 40));
        }
        writer.join().unwrap();

        assert_eq!(publisher.load(Timeframe::Daily).unwrap().unwrap().symbol_count(), 2);
    }
}
