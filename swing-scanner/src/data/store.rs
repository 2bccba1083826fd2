//! On-disk per-(symbol, timeframe) series files.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use swing_common::fs::{read_json, write_json_atomic};

use super::{Bar, Timeframe};

/// Directory of merged bar series, one JSON file per (symbol, timeframe).
#[derive(Debug, Clone)]
pub struct SeriesStore {
    root: PathBuf,
}

impl SeriesStore {
    /// Store rooted at `<cache_dir>/raw`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            root: cache_dir.join("raw"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name safe form of a symbol ("M&MFIN.NS" stays, "^NSEI" → "_NSEI").
    pub fn sanitize_symbol(symbol: &str) -> String {
        symbol
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '&') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    pub fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.root
            .join(format!("{}_{}.json", Self::sanitize_symbol(symbol), timeframe))
    }

    /// Load a cached series.
    ///
    /// A missing file is `None`. An unreadable or corrupt file is deleted and
    /// also reported as `None`, so the next fetch rebuilds it from scratch.
    pub fn load(&self, symbol: &str, timeframe: Timeframe) -> Option<Vec<Bar>> {
        let path = self.path_for(symbol, timeframe);
        match read_json::<Vec<Bar>>(&path) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    timeframe = %timeframe,
                    error = %e,
                    "Corrupt series cache, deleting"
                );
                if let Err(rm) = fs::remove_file(&path) {
                    debug!(path = %path.display(), error = %rm, "Could not delete corrupt cache file");
                }
                None
            }
        }
    }

    /// Persist a series atomically.
    pub fn save(&self, symbol: &str, timeframe: Timeframe, bars: &[Bar]) -> swing_common::Result<()> {
        write_json_atomic(&self.path_for(symbol, timeframe), bars)
    }
}
