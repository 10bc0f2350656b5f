//! Push notifications — Telegram consumer of cycle events.
//!
//! Subscribes to the scheduler's completed-cycle broadcast, formats the
//! change records into a single message, and delivers it through the
//! Telegram Bot API. Disabled cleanly (returns `None` at construction)
//! when no token/chat id is configured.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::AlertsConfig;
use crate::engine::scheduler::CycleReport;
use crate::types::{CycleStatus, TrackerError};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Maximum change lines per message — Telegram truncates long texts and
/// nobody reads a fifty-line diff on their phone anyway.
const MAX_CHANGE_LINES: usize = 10;

pub struct TelegramNotifier {
    http: Client,
    token: SecretString,
    chat_id: String,
    api_base: String,
}

impl TelegramNotifier {
    /// Build from config. Returns `Ok(None)` when the token or chat id
    /// env vars are not configured or not set — alerts are optional.
    pub fn from_config(alerts: &AlertsConfig) -> Result<Option<Self>, TrackerError> {
        let token = alerts
            .telegram_bot_token_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok());
        let chat_id = alerts
            .telegram_chat_id_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok());

        let (Some(token), Some(chat_id)) = (token, chat_id) else {
            info!("Telegram alerts not configured — push notifications disabled");
            return Ok(None);
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| TrackerError::fetch("telegram", e, false))?;

        Ok(Some(Self {
            http,
            token: SecretString::new(token),
            chat_id,
            api_base: TELEGRAM_API.to_string(),
        }))
    }

    /// Render one cycle report as a push message.
    pub fn format_report(report: &CycleReport) -> String {
        let mut lines = Vec::new();

        let headline = match report.cycle.status {
            CycleStatus::Succeeded => "✅",
            CycleStatus::PartialFailure => "⚠️",
            _ => "❌",
        };
        lines.push(format!(
            "{headline} MOA refresh #{} — {}",
            report.cycle.cycle_id, report.cycle.trading_date
        ));

        if let Some(snapshot) = &report.snapshot {
            lines.push(format!(
                "Total {} KRW across {} holdings",
                group_digits(&snapshot.total_valuation().round().to_string()),
                snapshot.holdings.len(),
            ));
        }

        let stale = report.cycle.stale_categories();
        if !stale.is_empty() {
            let names: Vec<String> = stale.iter().map(|c| c.to_string()).collect();
            lines.push(format!("Stale (carried forward): {}", names.join(", ")));
        }

        if report.changes.is_empty() {
            lines.push("No changes since the last snapshot.".to_string());
        } else {
            lines.push(String::new());
            for change in report.changes.iter().take(MAX_CHANGE_LINES) {
                lines.push(change.to_string());
            }
            if report.changes.len() > MAX_CHANGE_LINES {
                lines.push(format!(
                    "… and {} more",
                    report.changes.len() - MAX_CHANGE_LINES
                ));
            }
        }

        lines.join("\n")
    }

    /// Deliver one message to the configured chat.
    pub async fn send(&self, text: &str) -> Result<(), TrackerError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            self.token.expose_secret()
        );
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TrackerError::fetch("telegram", e, true))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TrackerError::fetch(
                "telegram",
                format!("HTTP {status}: {body}"),
                status.as_u16() == 429 || status.is_server_error(),
            ));
        }

        Ok(())
    }

    /// Consume cycle events until the sender goes away. Spawn this as a
    /// background task; delivery failures are logged, never fatal.
    pub async fn run(self, mut events: broadcast::Receiver<CycleReport>) {
        loop {
            match events.recv().await {
                Ok(report) => {
                    let text = Self::format_report(&report);
                    if let Err(e) = self.send(&text).await {
                        error!(error = %e, "Telegram delivery failed");
                    } else {
                        info!(cycle_id = report.cycle.cycle_id, "Telegram alert sent");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Notifier lagged behind cycle events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Insert thousands separators into a plain integer string.
fn group_digits(s: &str) -> String {
    let (sign, digits) = s.strip_prefix('-').map_or(("", s), |rest| ("-", rest));
    let whole = digits.split('.').next().unwrap_or(digits);

    let mut out = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    format!("{sign}{out}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AccountCategory, ChangeKind, ChangeRecord, Holding, RefreshCycle, Snapshot,
        SourceOutcome, SourceResult,
    };
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn report(status_partial: bool) -> CycleReport {
        let mut cycle = RefreshCycle::new(
            12,
            Utc::now(),
            NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
        );
        cycle.outcomes = vec![SourceOutcome {
            source: "krx".to_string(),
            category: AccountCategory::DomesticStock,
            result: SourceResult::Fresh { holdings: 1 },
        }];
        if status_partial {
            cycle.outcomes.push(SourceOutcome {
                source: "pension-etf".to_string(),
                category: AccountCategory::PensionEtf,
                result: SourceResult::CarriedForward {
                    holdings: 1,
                    reason: "timeout".to_string(),
                },
            });
        }
        cycle.resolve_status();

        let snapshot = Snapshot::new(
            12,
            Utc::now(),
            vec![Holding::new(
                "005930",
                "삼성전자",
                AccountCategory::DomesticStock,
                dec!(10),
                dec!(71200),
                NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            )],
        );

        CycleReport {
            cycle,
            snapshot: Some(snapshot),
            changes: vec![ChangeRecord {
                symbol: "005930".to_string(),
                display_name: "삼성전자".to_string(),
                kind: ChangeKind::PriceChange,
                previous_price: Some(dec!(70000)),
                new_price: Some(dec!(71200)),
                delta: dec!(1200),
                delta_pct: Some(dec!(0.017)),
            }],
        }
    }

    #[test]
    fn test_format_succeeded_report() {
        let text = TelegramNotifier::format_report(&report(false));
        assert!(text.starts_with("✅ MOA refresh #12"));
        assert!(text.contains("712,000 KRW"));
        assert!(text.contains("삼성전자"));
        assert!(!text.contains("Stale"));
    }

    #[test]
    fn test_format_partial_report_mentions_stale() {
        let text = TelegramNotifier::format_report(&report(true));
        assert!(text.starts_with("⚠️"));
        assert!(text.contains("Stale (carried forward): Pension ETF"));
    }

    #[test]
    fn test_format_no_changes() {
        let mut r = report(false);
        r.changes.clear();
        let text = TelegramNotifier::format_report(&r);
        assert!(text.contains("No changes"));
    }

    #[test]
    fn test_format_truncates_long_change_lists() {
        let mut r = report(false);
        let template = r.changes[0].clone();
        r.changes = (0..15)
            .map(|i| ChangeRecord {
                symbol: format!("{i:06}"),
                ..template.clone()
            })
            .collect();
        let text = TelegramNotifier::format_report(&r);
        assert!(text.contains("… and 5 more"));
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits("0"), "0");
        assert_eq!(group_digits("999"), "999");
        assert_eq!(group_digits("1000"), "1,000");
        assert_eq!(group_digits("1057000"), "1,057,000");
        assert_eq!(group_digits("-54321"), "-54,321");
        assert_eq!(group_digits("1234.56"), "1,234");
    }

    #[test]
    fn test_from_config_unset_env_disables() {
        let alerts = AlertsConfig {
            telegram_bot_token_env: Some("MOA_TEST_NO_SUCH_TOKEN_ENV".to_string()),
            telegram_chat_id_env: Some("MOA_TEST_NO_SUCH_CHAT_ENV".to_string()),
        };
        assert!(TelegramNotifier::from_config(&alerts).unwrap().is_none());

        let alerts = AlertsConfig {
            telegram_bot_token_env: None,
            telegram_chat_id_env: None,
        };
        assert!(TelegramNotifier::from_config(&alerts).unwrap().is_none());
    }
}
