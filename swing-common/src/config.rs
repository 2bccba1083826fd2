//! Configuration management for the swing scanner.
//!
//! Configuration lives in a single file at `~/.swingscan/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (SWING_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `SWING_LOG_LEVEL` → observability.log_level
//! - `SWING_LOG_FORMAT` → observability.log_format
//! - `SWING_CACHE_DIR` → scanner.cache_dir
//! - `SWING_CONCURRENCY` → scanner.concurrency
//! - `SWING_API_BASE_URL` → data_source.base_url
//! - `SWING_API_KEY` → data_source.api_key
//! - `SWING_WEBHOOK_URL` → notification.webhook_url (also enables notifications)
//! - `SWING_DB_PATH` → storage.db_path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".swingscan"),
        |dirs| dirs.home_dir().join(".swingscan"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Expand a leading `~` and environment variables in a configured path.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Scan pipeline tuning
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Watchlist ledger thresholds
    #[serde(default)]
    pub watchlist: WatchlistConfig,

    /// Upstream market data source
    #[serde(default)]
    pub data_source: DataSourceConfig,

    /// Record store
    #[serde(default)]
    pub storage: StorageConfig,

    /// Alert delivery
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Symbol universe
    #[serde(default)]
    pub universe: UniverseConfig,
}

impl Config {
    /// Load configuration from the default path. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load from `path` (or the default location) and apply environment overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("SWING_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("SWING_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(dir) = lookup("SWING_CACHE_DIR") {
            self.scanner.cache_dir = dir;
        }
        if let Some(n) = lookup("SWING_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.scanner.concurrency = n;
        }
        if let Some(url) = lookup("SWING_API_BASE_URL") {
            self.data_source.base_url = Some(url);
        }
        if let Some(key) = lookup("SWING_API_KEY") {
            self.data_source.api_key = Some(key);
        }
        if let Some(url) = lookup("SWING_WEBHOOK_URL") {
            self.notification.webhook_url = Some(url);
            self.notification.enabled = true;
        }
        if let Some(path) = lookup("SWING_DB_PATH") {
            self.storage.db_path = path;
        }
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// Scan pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Root directory for series caches, snapshots and the status record
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Concurrent per-symbol fetches (clamped to 1..=4)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Outbound request ceiling
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Backoff retries after a rate-limited request (attempt N waits N * step)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff step; attempt N waits N * step
    #[serde(default = "default_backoff_step_secs")]
    pub backoff_step_secs: u64,

    /// Minimum daily pre-score for promotion to the deep phase
    #[serde(default = "default_pre_score_threshold")]
    pub pre_score_threshold: u8,

    /// Top gainers from the bulk quote snapshot promoted in full scans
    #[serde(default = "default_quote_gainers")]
    pub quote_gainers: usize,

    /// Top losers from the bulk quote snapshot promoted in full scans
    #[serde(default = "default_quote_losers")]
    pub quote_losers: usize,

    /// Symbols promoted in input order when a full scan would promote none
    #[serde(default = "default_fallback_promotions")]
    pub fallback_promotions: usize,

    /// Daily bars required before a symbol is scored
    #[serde(default = "default_min_daily_bars")]
    pub min_daily_bars: usize,

    /// Initial fetch window for daily bars (days)
    #[serde(default = "default_lookback_daily_days")]
    pub lookback_daily_days: i64,

    /// Initial fetch window for hourly bars (days)
    #[serde(default = "default_lookback_hourly_days")]
    pub lookback_hourly_days: i64,

    /// Initial fetch window for 15-minute bars (days)
    #[serde(default = "default_lookback_m15_days")]
    pub lookback_m15_days: i64,

    /// Days re-fetched before the last cached bar on incremental fetches
    #[serde(default = "default_overlap_days")]
    pub overlap_days: i64,

    /// Exchange offset from UTC, used to assign daily bars to a calendar date
    #[serde(default = "default_exchange_utc_offset_minutes")]
    pub exchange_utc_offset_minutes: i32,
}

fn default_cache_dir() -> String {
    "~/.swingscan/cache".into()
}

fn default_concurrency() -> usize {
    3
}

fn default_requests_per_second() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_step_secs() -> u64 {
    2
}

fn default_pre_score_threshold() -> u8 {
    3
}

fn default_quote_gainers() -> usize {
    100
}

fn default_quote_losers() -> usize {
    50
}

fn default_fallback_promotions() -> usize {
    50
}

fn default_min_daily_bars() -> usize {
    20
}

fn default_lookback_daily_days() -> i64 {
    365
}

fn default_lookback_hourly_days() -> i64 {
    30
}

fn default_lookback_m15_days() -> i64 {
    5
}

fn default_overlap_days() -> i64 {
    1
}

fn default_exchange_utc_offset_minutes() -> i32 {
    330
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            concurrency: default_concurrency(),
            requests_per_second: default_requests_per_second(),
            max_retries: default_max_retries(),
            backoff_step_secs: default_backoff_step_secs(),
            pre_score_threshold: default_pre_score_threshold(),
            quote_gainers: default_quote_gainers(),
            quote_losers: default_quote_losers(),
            fallback_promotions: default_fallback_promotions(),
            min_daily_bars: default_min_daily_bars(),
            lookback_daily_days: default_lookback_daily_days(),
            lookback_hourly_days: default_lookback_hourly_days(),
            lookback_m15_days: default_lookback_m15_days(),
            overlap_days: default_overlap_days(),
            exchange_utc_offset_minutes: default_exchange_utc_offset_minutes(),
        }
    }
}

impl ScannerConfig {
    /// Expanded cache directory.
    pub fn cache_path(&self) -> PathBuf {
        expand_path(&self.cache_dir)
    }

    /// Worker pool size actually used.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, 4)
    }
}

// ============================================================================
// Watchlist
// ============================================================================

/// Watchlist ledger thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistConfig {
    /// Entry score required for admission and reactivation
    #[serde(default = "default_admission_score")]
    pub admission_score: u8,

    /// Entry score below which a record decays to INACTIVE
    #[serde(default = "default_decay_score")]
    pub decay_score: u8,

    /// Weakness score at which a record is demoted
    #[serde(default = "default_weakness_exit")]
    pub weakness_exit: u8,

    /// New admissions per calendar day
    #[serde(default = "default_daily_quota")]
    pub daily_quota: usize,

    /// Maximum ACTIVE records
    #[serde(default = "default_active_cap")]
    pub active_cap: usize,
}

fn default_admission_score() -> u8 {
    8
}

fn default_decay_score() -> u8 {
    5
}

fn default_weakness_exit() -> u8 {
    7
}

fn default_daily_quota() -> usize {
    5
}

fn default_active_cap() -> usize {
    50
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            admission_score: default_admission_score(),
            decay_score: default_decay_score(),
            weakness_exit: default_weakness_exit(),
            daily_quota: default_daily_quota(),
            active_cap: default_active_cap(),
        }
    }
}

// ============================================================================
// Data Source
// ============================================================================

/// Upstream market data endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Primary bar feed base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key used to open a session
    #[serde(default)]
    pub api_key: Option<String>,

    /// Secondary feed used when the primary fails
    #[serde(default)]
    pub secondary_url: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            secondary_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding positions, watchlist and scan results
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "~/.swingscan/swingscan.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Expanded database path.
    pub fn db_file(&self) -> PathBuf {
        expand_path(&self.db_path)
    }
}

// ============================================================================
// Notification
// ============================================================================

/// Alert delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Send alerts at all
    #[serde(default)]
    pub enabled: bool,

    /// Webhook receiving JSON `{"content": ...}` posts
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Alert on non-HOLD exit signals
    #[serde(default = "default_true")]
    pub notify_exits: bool,

    /// Post a summary of high-conviction results after each scan
    #[serde(default = "default_true")]
    pub notify_scan_summary: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            notify_exits: true,
            notify_scan_summary: true,
        }
    }
}

// ============================================================================
// Universe
// ============================================================================

/// Symbol universe split by index category.
///
/// Empty lists fall back to the built-in constituents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniverseConfig {
    #[serde(default)]
    pub next50: Vec<String>,

    #[serde(default)]
    pub midcap: Vec<String>,

    #[serde(default)]
    pub smallcap: Vec<String>,

    /// Uncategorized extras (ranked under "Total Market")
    #[serde(default)]
    pub extra: Vec<String>,
}

impl UniverseConfig {
    /// True when no list is configured.
    pub fn is_empty(&self) -> bool {
        self.next50.is_empty()
            && self.midcap.is_empty()
            && self.smallcap.is_empty()
            && self.extra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.scanner.concurrency, 3);
        assert_eq!(config.scanner.requests_per_second, 3);
        assert_eq!(config.scanner.exchange_utc_offset_minutes, 330);
        assert_eq!(config.watchlist.daily_quota, 5);
        assert_eq!(config.watchlist.active_cap, 50);
        assert!(!config.notification.enabled);
        assert!(config.universe.is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"scanner": {"concurrency": 2}, "observability": {"level": "debug"}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.scanner.concurrency, 2);
        assert_eq!(config.scanner.max_retries, 3);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_load_from_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SWING_LOG_LEVEL", "warn"),
            ("SWING_CONCURRENCY", "4"),
            ("SWING_WEBHOOK_URL", "https://hooks.example/abc"),
            ("SWING_CACHE_DIR", "/tmp/swing"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.observability.log_level, "warn");
        assert_eq!(config.scanner.concurrency, 4);
        assert!(config.notification.enabled);
        assert_eq!(config.scanner.cache_path(), PathBuf::from("/tmp/swing"));
    }

    #[test]
    fn test_effective_concurrency_is_clamped() {
        let mut scanner = ScannerConfig::default();
        scanner.concurrency = 0;
        assert_eq!(scanner.effective_concurrency(), 1);
        scanner.concurrency = 16;
        assert_eq!(scanner.effective_concurrency(), 4);
    }
}
