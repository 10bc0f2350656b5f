//! Domestic-stock quote source (KRX-listed tickers, brokerage account).
//!
//! Uses the Naver Finance polling API, which answers one batched request
//! for any number of tickers:
//!
//!   GET /api/realtime?query=SERVICE_ITEM:005930,000660
//!
//! The response nests quotes under `result.areas[].datas[]` with terse
//! field names (`cd` ticker, `nm` name, `nv` last/closing price). After
//! market close `nv` is the closing price, which is all this tracker needs.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{get_json, http_client, recent_trading_date, QuoteSource};
use crate::config::{PositionConfig, SourcesConfig};
use crate::normalize::{self, RawQuote};
use crate::types::{AccountCategory, Holding, TrackerError};

const BASE_URL: &str = "https://polling.finance.naver.com";
const SOURCE_NAME: &str = "krx";

// ---------------------------------------------------------------------------
// API response types (Naver polling JSON → Rust)
// ---------------------------------------------------------------------------

/// Envelope of `/api/realtime`. We only deserialize the fields we need.
#[derive(Debug, Deserialize)]
struct RealtimeResponse {
    #[serde(default)]
    result: Option<RealtimeResult>,
    /// Server wall clock, "YYYYMMDDHHMMSS".
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RealtimeResult {
    #[serde(default)]
    areas: Vec<RealtimeArea>,
}

#[derive(Debug, Deserialize)]
struct RealtimeArea {
    #[serde(default)]
    datas: Vec<RealtimeItem>,
}

/// One quote row. `nv` arrives as a bare number for stocks but the API
/// has been seen returning comma-grouped strings on other item types,
/// so it is kept as a raw value until normalization.
#[derive(Debug, Deserialize)]
struct RealtimeItem {
    #[serde(default)]
    cd: Option<String>,
    #[serde(default)]
    nm: Option<String>,
    #[serde(default)]
    nv: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Batch closing-price source for the domestic-stock account.
pub struct KrxStockSource {
    http: Client,
    positions: Vec<PositionConfig>,
    base_url: String,
    max_retries: u32,
    /// Market close boundary (KST) used for as-of date fallback.
    close: (u32, u32),
}

impl KrxStockSource {
    pub fn new(
        sources: &SourcesConfig,
        positions: Vec<PositionConfig>,
        close: (u32, u32),
    ) -> Result<Self, TrackerError> {
        Ok(Self {
            http: http_client(sources.request_timeout_secs)?,
            positions,
            base_url: sources
                .krx
                .base_url
                .clone()
                .unwrap_or_else(|| BASE_URL.to_string()),
            max_retries: sources.max_retries,
            close,
        })
    }

    fn query_url(&self) -> String {
        let codes: Vec<&str> = self.positions.iter().map(|p| p.symbol.as_str()).collect();
        let query = format!("SERVICE_ITEM:{}", codes.join(","));
        format!(
            "{}/api/realtime?query={}",
            self.base_url,
            urlencoding::encode(&query)
        )
    }

    /// Flatten the response envelope into raw quotes, dropping rows
    /// without a ticker.
    fn to_raw_quotes(response: RealtimeResponse) -> Vec<RawQuote> {
        // "YYYYMMDDHHMMSS" → "YYYYMMDD"
        let traded_at = response
            .time
            .as_deref()
            .filter(|t| t.len() >= 8)
            .map(|t| t[..8].to_string());

        response
            .result
            .map(|r| r.areas)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|area| area.datas)
            .filter_map(|item| match item.cd {
                Some(cd) => Some(RawQuote {
                    symbol: cd,
                    name: item.nm,
                    close_price: item.nv,
                    traded_at: traded_at.clone(),
                }),
                None => {
                    warn!(source = SOURCE_NAME, "Quote row without ticker, dropping");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl QuoteSource for KrxStockSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn category(&self) -> AccountCategory {
        AccountCategory::DomesticStock
    }

    async fn fetch(&self) -> Result<serde_json::Value, TrackerError> {
        if self.positions.is_empty() {
            return Ok(serde_json::json!({ "result": { "areas": [] } }));
        }

        let url = self.query_url();
        debug!(source = SOURCE_NAME, url = %url, "Fetching domestic stock quotes");

        let payload = get_json(&self.http, SOURCE_NAME, &url, self.max_retries).await?;
        info!(
            source = SOURCE_NAME,
            tickers = self.positions.len(),
            "Domestic quote batch fetched"
        );
        Ok(payload)
    }

    fn normalize(&self, raw: &serde_json::Value) -> Result<Vec<Holding>, TrackerError> {
        let response: RealtimeResponse = serde_json::from_value(raw.clone())
            .map_err(|e| TrackerError::parse(SOURCE_NAME, e))?;

        let quotes = Self::to_raw_quotes(response);
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
