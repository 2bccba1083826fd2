//! Alert delivery.
//!
//! Notifications are fire-and-forget: the orchestrator logs and ignores
//! delivery failures, so a dead webhook never changes scan results.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use swing_common::NotificationConfig;

use crate::analysis::exits::ExitSignal;
use crate::scanner::{JobState, ScanMode, ScanResult};

/// Most results listed in one scan summary.
const SUMMARY_LIMIT: usize = 15;

#[derive(Debug, Clone)]
pub enum Notification {
    /// High-conviction results of a finished scan
    ScanSummary {
        mode: ScanMode,
        scanned: usize,
        picks: Vec<ScanResult>,
    },
    ExitAlert(ExitSignal),
    /// Symbol admitted to the watchlist
    NewEntry { symbol: String, price: f64, score: u8 },
    JobStatus {
        state: JobState,
        progress: String,
        error: Option<String>,
    },
}

impl Notification {
    /// Plain-text rendering.
    pub fn render(&self) -> String {
        match self {
            Self::ScanSummary { mode, scanned, picks } => {
                let mut lines = vec![format!(
                    "**Scan complete** ({}): {} scanned, {} high-conviction",
                    mode,
                    scanned,
                    picks.len()
                )];
                for pick in picks.iter().take(SUMMARY_LIMIT) {
                    lines.push(format!(
                        "`{}` {} | score {}/10 | {} | {:.2} (stop {:.2})",
                        pick.symbol, pick.tag, pick.entry_score, pick.setup, pick.price, pick.stop
                    ));
                }
                if picks.len() > SUMMARY_LIMIT {
                    lines.push(format!("... and {} more", picks.len() - SUMMARY_LIMIT));
                }
                lines.join("\n")
            }
            Self::ExitAlert(signal) => format!(
                "**{}** `{}` @ {:.2} ({:+.1}%, {} days): {}",
                signal.action,
                signal.symbol,
                signal.current_price,
                signal.pnl_percent,
                signal.days_held,
                signal.reason
            ),
            Self::NewEntry { symbol, price, score } => {
                format!("**Watchlist add** `{}` @ {:.2} | score {}/10", symbol, price, score)
            }
            Self::JobStatus { state, progress, error } => match error {
                Some(error) => format!("**Scan {}** ({}): {}", state, progress, error),
                None => format!("**Scan {}** ({})", state, progress),
            },
        }
    }
}

/// Destination for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Logs notifications instead of delivering them.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(message = %notification.render(), "Notification");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts `{"content": text}` to a webhook.
pub struct WebhookSink {
    url: String,
    retry_count: u32,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            url: url.into(),
            retry_count: 2,
            client,
        }
    }

    async fn try_send(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { content: text })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, error_text);
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let text = notification.render();
        let mut last_error = None;

        for attempt in 1..=self.retry_count {
            match self.try_send(&text).await {
                Ok(()) => {
                    tracing::debug!("Webhook notification sent");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry_count,
                        error = %e,
                        "Failed to send notification"
                    );
                    last_error = Some(e);
                    if attempt < self.retry_count {
                        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Notification not sent")))
    }
}

/// Sink selected by config: webhook when enabled with a URL, else log only.
pub fn sink_from_config(config: &NotificationConfig) -> Arc<dyn NotificationSink> {
    match (&config.enabled, &config.webhook_url) {
        (true, Some(url)) if !url.is_empty() => Arc::new(WebhookSink::new(url.clone())),
        _ => Arc::new(LogSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::exits::ExitAction;
    use crate::analysis::scoring::Confidence;
    use crate::scanner::report::tests::result;

    #[test]
    fn test_render_exit_alert() {
        let signal = ExitSignal {
            symbol: "ABC".into(),
            entry_price: 100.0,
            current_price: 130.0,
            pnl_percent: 30.0,
            action: ExitAction::BookProfit,
            reason: "RSI overheated (> 75)".into(),
            days_held: 4,
            rsi: Some(80.0),
            ema9: 120.0,
        };
        let text = Notification::ExitAlert(signal).render();
        assert_eq!(text, "**BOOK PROFIT** `ABC` @ 130.00 (+30.0%, 4 days): RSI overheated (> 75)");
    }

    #[test]
    fn test_render_summary_truncates() {
        let picks: Vec<_> = (0..20)
            .map(|i| result(&format!("S{i}"), 8, Confidence::High, 10.0))
            .collect();
        let text = Notification::ScanSummary {
            mode: ScanMode::Full,
            scanned: 120,
            picks,
        }
        .render();

        assert!(text.starts_with("**Scan complete** (full): 120 scanned, 20 high-conviction"));
        assert_eq!(text.lines().count(), 1 + SUMMARY_LIMIT + 1);
        assert!(text.ends_with("... and 5 more"));
    }

    #[test]
    fn test_sink_from_config() {
        let mut config = NotificationConfig::default();
        config.webhook_url = Some("http://localhost:1/hook".into());
        // disabled: log sink, nothing is posted
        let sink = sink_from_config(&config);
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let notification = Notification::NewEntry {
            symbol: "ABC".into(),
            price: 1.0,
            score: 9,
        };
        assert!(rt.block_on(sink.notify(&notification)).is_ok());
    }

    #[tokio::test]
    async fn test_webhook_failure_is_error() {
        let sink = WebhookSink::new("http://127.0.0.1:9/unreachable");
        let notification = Notification::JobStatus {
            state: JobState::Failed,
            progress: "12%".into(),
            error: Some("boom".into()),
        };
        assert!(sink.notify(&notification).await.is_err());
    }
}
