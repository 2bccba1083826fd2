//! Swing Scanner - one scan per invocation.
//!
//! Exits 0 when the scan completes (even with no results) and 1 when it
//! fails; the failure is also recorded in `engine_status.json`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use swing_common::config::Config;
use swing_common::logging::init_logging;
use swing_scanner::data::{
    shared_limiter, DataSource, MemoryCache, ResilientSource, RestSource, RestSourceConfig, RetryPolicy,
};
use swing_scanner::notification::sink_from_config;
use swing_scanner::scanner::StatusWriter;
use swing_scanner::store::SqliteStore;
use swing_scanner::{ScanMode, ScanOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "swing-scanner")]
#[command(version)]
#[command(about = "Multi-timeframe swing scanner", long_about = None)]
struct Cli {
    /// Scan the whole universe or only held and watched symbols
    #[arg(long, value_enum, default_value_t = ScanMode::Full)]
    mode: ScanMode,

    /// Config file (default: ~/.swingscan/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_with_env(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );
    tracing::info!(mode = %cli.mode, "Swing Scanner v{}", env!("CARGO_PKG_VERSION"));

    match run(&config, cli.mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Scan aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config, mode: ScanMode) -> Result<()> {
    let status = StatusWriter::new(&config.scanner.cache_path(), mode);

    let orchestrator = match build_orchestrator(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            // the orchestrator records its own failures; setup errors land here
            if let Err(write_err) = status.failed("0%", format!("{:#}", e)) {
                tracing::warn!(error = %write_err, "Failed to record FAILED status");
            }
            return Err(e);
        }
    };

    let memory = MemoryCache::new();
    let report = orchestrator.run(mode, &memory).await?;

    let stats = memory.stats();
    tracing::info!(
        results = report.results.len(),
        skipped = report.skipped.len(),
        cached_series = stats.entries,
        cached_bars = stats.total_bars,
        "Done"
    );
    Ok(())
}

fn build_orchestrator(config: &Config) -> Result<ScanOrchestrator> {
    let source = build_source(config)?;
    let store = SqliteStore::open(&config.storage.db_file()).context("Failed to open record store")?;
    let sink = sink_from_config(&config.notification);

    Ok(ScanOrchestrator::new(config, source, Arc::new(store), sink))
}

fn build_source(config: &Config) -> Result<Arc<dyn DataSource>> {
    let ds = &config.data_source;
    let base_url = ds
        .base_url
        .clone()
        .context("data_source.base_url is not set (or SWING_API_BASE_URL)")?;

    let primary = RestSource::new(
        RestSourceConfig::new("primary", base_url)
            .with_api_key(ds.api_key.clone())
            .with_timeout_secs(ds.timeout_secs),
    );
    let limiter = shared_limiter("market-data", config.scanner.requests_per_second);
    let policy = RetryPolicy {
        max_retries: config.scanner.max_retries,
        backoff_step: Duration::from_secs(config.scanner.backoff_step_secs),
    };

    let mut source = ResilientSource::new(Arc::new(primary), limiter).with_policy(policy);
    if let Some(url) = ds.secondary_url.clone() {
        let secondary = RestSource::new(
            RestSourceConfig::new("secondary", url)
                .with_api_key(ds.api_key.clone())
                .with_timeout_secs(ds.timeout_secs),
        );
        source = source.with_secondary(Arc::new(secondary));
    }

    Ok(Arc::new(source))
}
