//! Swing Common - Shared configuration, logging and error types for the swing scanner.
//!
//! This crate provides:
//! - Configuration types and loading (`~/.swingscan/config.json` + `SWING_*` overrides)
//! - Error types and handling utilities
//! - Logging setup with noise filtering
//! - Atomic file helpers used for every file a reader may poll

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod fs;
pub mod logging;

pub use config::{
    Config, DataSourceConfig, NotificationConfig, ObservabilityConfig, ScannerConfig,
    StorageConfig, UniverseConfig, WatchlistConfig,
};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, ScannerConfig};
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
}
