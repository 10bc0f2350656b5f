//! Pension-savings ETF quote source.
//!
//! The pension account only holds KRX-listed ETFs, which the mobile
//! Naver Finance API serves one fund at a time:
//!
//!   GET /api/etf/{code}/basic
//!
//! Prices arrive as comma-grouped text (`"closePrice": "18,500"`); thinly
//! traded funds occasionally omit the closing price, in which case the
//! net asset value stands in. Individual funds that fail to fetch are
//! skipped — the source only fails as a whole when every request fails.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{get_json, http_client, recent_trading_date, QuoteSource};
use crate::config::{PositionConfig, SourcesConfig};
use crate::normalize::{self, decimal_from_value, RawQuote};
use crate::types::{AccountCategory, Holding, TrackerError};

const BASE_URL: &str = "https://m.stock.naver.com";
const SOURCE_NAME: &str = "pension-etf";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// `/api/etf/{code}/basic` — only the fields we need.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtfBasic {
    #[serde(default)]
    item_code: Option<String>,
    #[serde(default)]
    stock_name: Option<String>,
    /// Comma-grouped text, e.g. "18,500".
    #[serde(default)]
    close_price: Option<serde_json::Value>,
    /// Net asset value; stands in when closePrice is absent.
    #[serde(default)]
    nav: Option<serde_json::Value>,
    /// ISO timestamp of the last trade, e.g. "2026-02-20T15:30:00+09:00".
    #[serde(default)]
    local_traded_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Per-fund closing-price source for the pension-savings account.
pub struct PensionEtfSource {
    http: Client,
    positions: Vec<PositionConfig>,
    base_url: String,
    max_retries: u32,
    close: (u32, u32),
}

impl PensionEtfSource {
    pub fn new(
        sources: &SourcesConfig,
        positions: Vec<PositionConfig>,
        close: (u32, u32),
    ) -> Result<Self, TrackerError> {
        Ok(Self {
            http: http_client(sources.request_timeout_secs)?,
            positions,
            base_url: sources
                .pension
                .base_url
                .clone()
                .unwrap_or_else(|| BASE_URL.to_string()),
            max_retries: sources.max_retries,
            close,
        })
    }

    /// Convert one wrapped per-fund body into a raw quote.
    fn to_raw_quote(code: &str, body: EtfBasic) -> RawQuote {
        // Prefer the closing price; fall back to NAV when the provider
        // omitted it or sent something unparseable.
        let price = body
            .close_price
            .filter(|v| decimal_from_value(v).is_some())
            .or(body.nav)
            .unwrap_or(serde_json::Value::Null);

        RawQuote {
            symbol: body.item_code.unwrap_or_else(|| code.to_string()),
            name: body.stock_name,
            close_price: price,
            traded_at: body.local_traded_at,
        }
    }
}

#[async_trait]
impl QuoteSource for PensionEtfSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn category(&self) -> AccountCategory {
        AccountCategory::PensionEtf
    }

    /// Fetch each tracked fund. The raw payload is an array of
    /// `{ "code": ..., "body": <provider response> }` wrappers so that
    /// normalization still knows which request produced which body.
    async fn fetch(&self) -> Result<serde_json::Value, TrackerError> {
        if self.positions.is_empty() {
            return Ok(json!([]));
        }

        let mut entries = Vec::with_capacity(self.positions.len());
        let mut last_error: Option<TrackerError> = None;

        for position in &self.positions {
            let url = format!("{}/api/etf/{}/basic", self.base_url, position.symbol);
            debug!(source = SOURCE_NAME, url = %url, "Fetching ETF quote");

            match get_json(&self.http, SOURCE_NAME, &url, self.max_retries).await {
                Ok(body) => entries.push(json!({ "code": position.symbol, "body": body })),
                Err(e) => {
                    warn!(
                        source = SOURCE_NAME,
                        symbol = %position.symbol,
                        error = %e,
                        "ETF quote failed, continuing with remaining funds"
                    );
                    last_error = Some(e);
                }
            }
        }

        if entries.is_empty() {
            // Every fund failed — surface the last error as the source's.
            return Err(last_error
                .unwrap_or_else(|| TrackerError::fetch(SOURCE_NAME, "no funds fetched", true)));
        }

        info!(
            source = SOURCE_NAME,
            fetched = entries.len(),
            tracked = self.positions.len(),
            "Pension ETF quotes fetched"
        );
        Ok(serde_json::Value::Array(entries))
    }

    fn normalize(&self, raw: &serde_json::Value) -> Result<Vec<Holding>, TrackerError> {
        let entries = raw
            .as_array()
            .ok_or_else(|| TrackerError::parse(SOURCE_NAME, "expected array of fund payloads"))?;

        let mut quotes = Vec::with_capacity(entries.len());
        for entry in entries {
            let code = entry
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or_default()
                .to_string();
            let body = entry.get("body").cloned().unwrap_or(serde_json::Value::Null);

            match serde_json::from_value::<EtfBasic>(body) {
                Ok(parsed) => quotes.push(Self::to_raw_quote(&code, parsed)),
                Err(e) => {
                    warn!(
                        source = SOURCE_NAME,
                        symbol = %code,
                        error = %e,
                        "Malformed fund payload, dropping record"
                    );
                }
            }
        }

        let fallback = recent_trading_date(Utc::now(), self.close);
        Ok(normalize::normalize(
            SOURCE_NAME,
            self.category(),
            &self.positions,
            quotes,
            fallback,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
