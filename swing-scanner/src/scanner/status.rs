//! Durable job status record.
//!
//! `engine_status.json` is polled by readers outside the process, so every
//! write goes through write-to-temp + rename.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::ScanMode;

pub const STATUS_FILE: &str = "engine_status.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    pub last_updated: DateTime<Utc>,
    /// Human-readable progress, e.g. "42%" or "No Data"
    pub progress: String,
    pub mode: ScanMode,
    #[serde(default)]
    pub error: Option<String>,
}

/// Writes the status record under the cache directory.
#[derive(Debug, Clone)]
pub struct StatusWriter {
    path: PathBuf,
    mode: ScanMode,
}

impl StatusWriter {
    pub fn new(cache_dir: &Path, mode: ScanMode) -> Self {
        Self {
            path: cache_dir.join(STATUS_FILE),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, state: JobState, progress: impl Into<String>, error: Option<String>) -> swing_common::Result<JobStatus> {
        let status = JobStatus {
            state,
            last_updated: Utc::now(),
            progress: progress.into(),
            mode: self.mode,
            error,
        };
        swing_common::fs::write_json_atomic(&self.path, &status)?;
        Ok(status)
    }

    pub fn running(&self, progress: impl Into<String>) -> swing_common::Result<JobStatus> {
        self.write(JobState::Running, progress, None)
    }

    pub fn completed(&self, progress: impl Into<String>) -> swing_common::Result<JobStatus> {
        self.write(JobState::Completed, progress, None)
    }

    pub fn failed(&self, progress: impl Into<String>, error: impl Into<String>) -> swing_common::Result<JobStatus> {
        self.write(JobState::Failed, progress, Some(error.into()))
    }

    pub fn read(&self) -> swing_common::Result<Option<JobStatus>> {
        swing_common::fs::read_json(&self.path)
    }
}

/// Monotonic progress percentage across scan phases.
///
/// A phase owns the band `[start, end]`; `advance(done, total)` maps
/// completion within the phase onto that band. Progress never moves back.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    percent: u8,
    band: (u8, u8),
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn label(&self) -> String {
        format!("{}%", self.percent)
    }

    /// Enter a phase; progress jumps to `start` if behind it.
    pub fn enter(&mut self, start: u8, end: u8) -> u8 {
        self.band = (start.min(100), end.clamp(start, 100));
        self.set(self.band.0)
    }

    pub fn advance(&mut self, done: usize, total: usize) -> u8 {
        let (start, end) = self.band;
        let fraction = if total == 0 { 1.0 } else { (done.min(total)) as f64 / total as f64 };
        let value = f64::from(start) + fraction * f64::from(end - start);
        self.set(value.floor() as u8)
    }

    pub fn finish(&mut self) -> u8 {
        self.set(100)
    }

    fn set(&mut self, value: u8) -> u8 {
        self.percent = self.percent.max(value.min(100));
        self.percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_written_atomically() {
        let dir = TempDir::new().unwrap();
        let writer = StatusWriter::new(dir.path(), ScanMode::Watchlist);

        writer.running("10%").unwrap();
        writer.failed("10%", "snapshot write failed").unwrap();

        let status = writer.read().unwrap().unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("snapshot write failed"));
        assert_eq!(status.mode, ScanMode::Watchlist);

        let raw = std::fs::read_to_string(writer.path()).unwrap();
        assert!(raw.contains("\"FAILED\""));
        assert!(raw.contains("\"watchlist\""));
        // only the status file, no leftover temp files
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_progress_monotonic() {
        let mut progress = ProgressTracker::new();
        progress.enter(0, 45);
        assert_eq!(progress.advance(1, 2), 22);
        assert_eq!(progress.advance(2, 2), 45);
        // going backwards inside a phase is ignored
        assert_eq!(progress.advance(0, 2), 45);

        progress.enter(45, 85);
        assert_eq!(progress.advance(1, 4), 55);
        // entering an earlier band does not rewind
        assert_eq!(progress.enter(0, 10), 55);
        assert_eq!(progress.finish(), 100);
        assert_eq!(progress.label(), "100%");
    }

    #[test]
    fn test_empty_phase_completes_band() {
        let mut progress = ProgressTracker::new();
        progress.enter(45, 85);
        assert_eq!(progress.advance(0, 0), 85);
    }
}
