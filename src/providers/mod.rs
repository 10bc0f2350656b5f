//! Quote source integrations.
//!
//! Defines the `QuoteSource` trait and provides implementations for:
//! - KRX domestic stocks — batch closing-price quotes (brokerage account)
//! - Pension-savings ETFs — per-fund closing price / NAV quotes
//!
//! Every source implements the same fetch/normalize contract regardless of
//! how its provider structures payloads; the scheduler only ever sees the
//! trait object.

pub mod krx;
pub mod pension;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Asia::Seoul;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{AccountCategory, Holding, TrackerError};

/// Base delay for exponential backoff between retries (ms).
const BASE_BACKOFF_MS: u64 = 500;

/// Abstraction over external quote providers.
///
/// `fetch` performs the provider I/O and returns the raw payload untouched;
/// `normalize` maps it onto canonical holdings, skipping malformed records.
/// Keeping the raw payload in between preserves it for logging and lets
/// normalization stay pure and testable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Source name for logging and cycle outcome records.
    fn name(&self) -> &str;

    /// The account category this source refreshes.
    fn category(&self) -> AccountCategory;

    /// Fetch the raw provider payload. Applies bounded timeouts and
    /// retries transient failures with backoff.
    async fn fetch(&self) -> Result<serde_json::Value, TrackerError>;

    /// Map a raw payload onto canonical holdings. Malformed individual
    /// records are dropped with a logged reason; only a payload whose
    /// overall shape is wrong is an error.
    fn normalize(&self, raw: &serde_json::Value) -> Result<Vec<Holding>, TrackerError>;

    /// Fetch and normalize in one step.
    async fn collect(&self) -> Result<Vec<Holding>, TrackerError> {
        let raw = self.fetch().await?;
        self.normalize(&raw)
    }
}

/// Build the HTTP client every source uses: bounded timeout, explicit UA.
pub fn http_client(timeout_secs: u64) -> Result<Client, TrackerError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent("moa/0.1.0 (holdings-tracker)")
        .build()
        .map_err(|e| TrackerError::fetch("http", e, false))
}

/// GET a JSON document with retry + exponential backoff.
///
/// Transient failures (transport errors, 429, 5xx) are retried up to
/// `max_retries` times; anything else fails immediately. A body that is
/// not valid JSON is a parse error, not retried.
pub async fn get_json(
    client: &Client,
    source: &str,
    url: &str,
    max_retries: u32,
) -> Result<serde_json::Value, TrackerError> {
    let mut last_error = String::new();

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
            debug!(source, attempt, delay_ms = delay, "Retrying quote fetch");
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| TrackerError::parse(source, e));
                }

                // Retryable: 429 (rate limit) and server-side errors.
                if status.as_u16() == 429 || status.is_server_error() {
                    let body = response.text().await.unwrap_or_default();
                    warn!(source, status = %status, attempt, "Retryable provider error");
                    last_error = format!("HTTP {status}: {body}");
                    continue;
                }

                // 4xx and friends are permanent — do not retry.
                let body = response.text().await.unwrap_or_default();
                return Err(TrackerError::fetch(
                    source,
                    format!("HTTP {status}: {body}"),
                    false,
                ));
            }
            Err(e) => {
                warn!(source, attempt, error = %e, "Quote request failed");
                last_error = format!("request error: {e}");
                continue;
            }
        }
    }

    Err(TrackerError::fetch(
        source,
        format!("gave up after {max_retries} retries: {last_error}"),
        true,
    ))
}

/// The most recent market-close date as seen from `now` (UTC).
///
/// Before the close boundary the previous day is used; Saturdays and
/// Sundays are walked back to Friday. KRX public holidays are not modeled —
/// a quote fetched on one simply reports the prior trading date itself.
pub fn recent_trading_date(now: chrono::DateTime<Utc>, close: (u32, u32)) -> NaiveDate {
    let kst = Seoul.from_utc_datetime(&now.naive_utc());
    let close_passed = (kst.hour(), kst.minute()) >= close;

    let mut date = kst.date_naive();
    if !close_passed {
        date = date.pred_opt().expect("date underflow");
    }
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date.pred_opt().expect("date underflow");
    }
    date
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
