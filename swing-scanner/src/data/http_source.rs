//! JSON-over-HTTP broker adapter.
//!
//! # Endpoints (relative to `base_url`)
//! - `POST /session` `{"api_key"}` → `{"status", "data": {"token"}}`
//! - `POST /candles` `{"symbol", "interval", "fromdate", "todate"}` with a
//!   bearer token → `{"status", "message", "errorcode", "data": [[ts, o, h, l, c, v], ...]}`
//! - `POST /quotes` `{"symbols": [...]}` → `{"status", "data": [{"symbol", "ltp", "close", "volume"}]}`
//!
//! Timestamps are RFC 3339 strings with an offset, or epoch milliseconds.
//!
//! # Error mapping
//! - HTTP 401/403, errorcode `AG8001`, or an "Invalid Token" message → `SessionExpired`
//! - HTTP 429 or a rate message → `RateLimited`
//! - `status: false` otherwise → `DataNotAvailable`

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{Bar, DataSource, Quote, SourceError, Timeframe};

// ============================================================================
// Constants
// ============================================================================

const SESSION_ENDPOINT: &str = "/session";
const CANDLES_ENDPOINT: &str = "/candles";
const QUOTES_ENDPOINT: &str = "/quotes";

/// Broker error code for an expired or invalid session token
const SESSION_EXPIRED_CODE: &str = "AG8001";

/// Suggested wait after an HTTP 429
const RATE_LIMIT_RETRY_SECS: u64 = 2;

/// Request date format expected by the candle endpoint
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Interval name for the candle endpoint.
fn interval_name(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M15 => "FIFTEEN_MINUTE",
        Timeframe::H1 => "ONE_HOUR",
        Timeframe::Daily => "ONE_DAY",
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errorcode: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct QuoteRow {
    symbol: String,
    ltp: f64,
    #[serde(default)]
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Serialize)]
struct CandleRequest<'a> {
    symbol: &'a str,
    interval: &'a str,
    fromdate: String,
    todate: String,
}

fn classify_envelope_error(message: &str, errorcode: &str) -> SourceError {
    let lower = message.to_lowercase();
    if errorcode == SESSION_EXPIRED_CODE || lower.contains("invalid token") {
        SourceError::SessionExpired(message.to_string())
    } else if lower.contains("rate") || lower.contains("exceed") {
        SourceError::RateLimited {
            retry_after_secs: Some(RATE_LIMIT_RETRY_SECS),
        }
    } else {
        SourceError::DataNotAvailable(message.to_string())
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Parse `[ts, o, h, l, c, v]` rows, skipping malformed ones, oldest first.
fn parse_candles(rows: &[Vec<Value>]) -> Vec<Bar> {
    let mut bars: Vec<Bar> = rows
        .iter()
        .filter_map(|row| {
            if row.len() < 6 {
                return None;
            }
            let num = |i: usize| row[i].as_f64();
            Some(Bar::new(
                parse_timestamp(&row[0])?,
                num(1)?,
                num(2)?,
                num(3)?,
                num(4)?,
                num(5)?,
            ))
        })
        .collect();
    bars.sort_by_key(|b| b.timestamp);
    bars
}

// ============================================================================
// REST Source
// ============================================================================

/// Connection settings for [`RestSource`].
#[derive(Debug, Clone)]
pub struct RestSourceConfig {
    /// Name used in logs
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl RestSourceConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

/// Broker REST adapter. Rate limiting and retries are applied by
/// [`super::ResilientSource`], not here.
pub struct RestSource {
    config: RestSourceConfig,
    client: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl RestSource {
    pub fn new(config: RestSourceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            client,
            token: RwLock::new(None),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn map_send_error(e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Network("Request timeout".into())
        } else if e.is_connect() {
            SourceError::Network("Connection failed".into())
        } else {
            SourceError::Network(e.to_string())
        }
    }

    /// Current token, logging in first when there is none.
    async fn ensure_token(&self) -> Result<Option<String>, SourceError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(Some(token));
        }
        if self.config.api_key.is_none() {
            return Ok(None);
        }
        self.login().await?;
        Ok(self.token.read().await.clone())
    }

    async fn login(&self) -> Result<(), SourceError> {
        let Some(api_key) = &self.config.api_key else {
            return Ok(());
        };

        let response = self
            .client
            .post(self.url(SESSION_ENDPOINT))
            .json(&serde_json::json!({ "api_key": api_key }))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let envelope: Envelope<SessionData> = response
            .json()
            .await
            .map_err(|e| SourceError::Internal(format!("Failed to parse session response: {}", e)))?;

        match envelope.data {
            Some(session) if envelope.status => {
                *self.token.write().await = Some(session.token);
                info!(source = %self.config.name, "Session opened");
                Ok(())
            }
            _ => Err(SourceError::Internal(format!(
                "Login failed: {} (code {})",
                envelope.message, envelope.errorcode
            ))),
        }
    }

    /// POST `body` to `endpoint` and unwrap the response envelope.
    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<Option<T>, SourceError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let mut request = self
            .client
            .post(self.url(endpoint))
            .header("accept", "application/json")
            .json(body);
        if let Some(token) = self.ensure_token().await? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(Self::map_send_error)?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SourceError::SessionExpired(format!("HTTP {}", status)));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited {
                retry_after_secs: Some(RATE_LIMIT_RETRY_SECS),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Internal(format!("HTTP {}: {}", status, body)));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| SourceError::Internal(format!("Failed to parse response: {}", e)))?;

        if !envelope.status {
            return Err(classify_envelope_error(&envelope.message, &envelope.errorcode));
        }
        Ok(envelope.data)
    }
}

#[async_trait]
impl DataSource for RestSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        lookback_days: i64,
    ) -> Result<Vec<Bar>, SourceError> {
        let to = Utc::now();
        let from = to - ChronoDuration::days(lookback_days.max(1));
        let request = CandleRequest {
            symbol,
            interval: interval_name(timeframe),
            fromdate: from.format(DATE_FORMAT).to_string(),
            todate: to.format(DATE_FORMAT).to_string(),
        };

        debug!(source = %self.config.name, symbol, timeframe = %timeframe, lookback_days, "Fetching candles");

        let rows: Vec<Vec<Value>> = self
            .post(CANDLES_ENDPOINT, &request)
            .await?
            .unwrap_or_default();
        Ok(parse_candles(&rows))
    }

    async fn get_latest_quotes(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Quote>, SourceError> {
        let body = serde_json::json!({ "symbols": symbols });
        let rows: Vec<QuoteRow> = self.post(QUOTES_ENDPOINT, &body).await?.unwrap_or_default();
        let now = Utc::now();

        Ok(rows
            .into_iter()
            .map(|row| {
                let quote = Quote {
                    symbol: row.symbol.clone(),
                    last: row.ltp,
                    prev_close: row.close,
                    volume: row.volume,
                    timestamp: now,
                };
                (row.symbol, quote)
            })
            .collect())
    }

    async fn reauthenticate(&self) -> Result<(), SourceError> {
        *self.token.write().await = None;
        self.login().await
    }
}
