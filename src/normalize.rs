//! Normalization of provider-specific quote records into canonical holdings.
//!
//! Pure functions only — no I/O. Each quote source parses its own payload
//! shape into [`RawQuote`] records and hands them here; this module maps
//! provider conventions (comma-grouped KRW strings, assorted date formats)
//! onto the canonical [`Holding`] model. Records that cannot be mapped are
//! dropped with a logged reason, never a batch-ending error.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

use crate::config::PositionConfig;
use crate::types::{AccountCategory, Holding};

/// A provider quote reduced to the fields the canonical model needs,
/// still in the provider's own encoding.
#[derive(Debug, Clone)]
pub struct RawQuote {
    pub symbol: String,
    /// Instrument name as the provider reports it.
    pub name: Option<String>,
    /// Closing price as the provider sends it — a JSON number, or text
    /// like "71,200".
    pub close_price: serde_json::Value,
    /// Provider trade date: "20260220", "2026-02-20", or an ISO timestamp.
    pub traded_at: Option<String>,
}

/// Map one provider's raw quotes onto the configured positions.
///
/// Total over the provider's declared output: a malformed record or a quote
/// for a symbol we do not track is skipped with a warning. Quantity comes
/// from the position config; price and as-of date come from the quote;
/// `fallback_date` fills in when the provider omits the trade date.
pub fn normalize(
    provider: &str,
    category: AccountCategory,
    positions: &[PositionConfig],
    raws: Vec<RawQuote>,
    fallback_date: NaiveDate,
) -> Vec<Holding> {
    let tracked: HashMap<&str, &PositionConfig> =
        positions.iter().map(|p| (p.symbol.as_str(), p)).collect();

    let mut holdings = Vec::with_capacity(raws.len());

    for raw in raws {
        let Some(position) = tracked.get(raw.symbol.as_str()) else {
            warn!(provider, symbol = %raw.symbol, "Quote for untracked symbol, dropping");
            continue;
        };

        let price = match decimal_from_value(&raw.close_price) {
            Some(p) if p >= Decimal::ZERO => p,
            Some(p) => {
                warn!(provider, symbol = %raw.symbol, price = %p, "Negative price, dropping record");
                continue;
            }
            None => {
                warn!(
                    provider,
                    symbol = %raw.symbol,
                    raw = %raw.close_price,
                    "Unparseable close price, dropping record"
                );
                continue;
            }
        };

        let as_of = match &raw.traded_at {
            Some(s) => match parse_trade_date(s) {
                Some(d) => d,
                None => {
                    warn!(provider, symbol = %raw.symbol, traded_at = %s, "Unparseable trade date, using fallback");
                    fallback_date
                }
            },
            None => fallback_date,
        };

        let name = position
            .name
            .clone()
            .or(raw.name)
            .unwrap_or_else(|| raw.symbol.clone());

        holdings.push(Holding::new(
            raw.symbol,
            name,
            category,
            position.quantity,
            price,
            as_of,
        ));
    }

    holdings
}

/// Parse a provider price value: a JSON number, or text that may carry
/// thousands separators ("71,200").
pub fn decimal_from_value(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => {
            let cleaned = s.trim().replace(',', "");
            if cleaned.is_empty() {
                return None;
            }
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

/// Parse the trade-date formats seen across KRX-adjacent endpoints:
/// "20260220", "2026-02-20", and ISO timestamps like
/// "2026-02-20T15:30:00+09:00" (date part taken as-is — it is already
/// the exchange-local close date).
pub fn parse_trade_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    // Timestamp: take the leading date component.
    if s.len() >= 10 {
        if let Ok(d) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return Some(d);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
