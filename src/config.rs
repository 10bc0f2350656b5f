//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the Telegram bot token) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub holdings: HoldingsConfig,
    pub sources: SourcesConfig,
    pub store: StoreConfig,
    pub dashboard: DashboardConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    pub name: String,
    /// Local market close boundary, "HH:MM" in Asia/Seoul. Refreshes for a
    /// trading day only run after this time has passed.
    pub market_close: String,
    /// How often the scheduler re-evaluates whether a refresh is due.
    pub poll_interval_secs: u64,
}

/// The tracked positions, per account. Quantities live in config because
/// this is a single-operator tracker; prices come from the quote sources.
#[derive(Debug, Deserialize, Clone)]
pub struct HoldingsConfig {
    #[serde(default)]
    pub domestic: Vec<PositionConfig>,
    #[serde(default)]
    pub pension: Vec<PositionConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PositionConfig {
    /// 6-digit KRX ticker, e.g. "005930".
    pub symbol: String,
    /// Optional override; the provider's name is used when absent.
    #[serde(default)]
    pub name: Option<String>,
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    pub krx: SourceConfig,
    pub pension: SourceConfig,
    /// Per-request timeout applied to every quote fetch.
    pub request_timeout_secs: u64,
    /// Maximum retries per request on transient failures.
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub enabled: bool,
    /// Base URL override, mainly for tests against a local stub.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// SQLite database path, e.g. "data/moa.db".
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    pub telegram_bot_token_env: Option<String>,
    pub telegram_chat_id_env: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that TOML typing alone cannot express.
    fn validate(&self) -> Result<()> {
        close_time_parts(&self.tracker.market_close).with_context(|| {
            format!(
                "tracker.market_close must be HH:MM, got {:?}",
                self.tracker.market_close
            )
        })?;
        for p in self.holdings.domestic.iter().chain(&self.holdings.pension) {
            anyhow::ensure!(
                p.quantity >= Decimal::ZERO,
                "holding {} has negative quantity",
                p.symbol
            );
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

/// Parse "HH:MM" into (hour, minute).
pub fn close_time_parts(s: &str) -> Result<(u32, u32)> {
    let (h, m) = s
        .split_once(':')
        .context("expected HH:MM")?;
    let hour: u32 = h.trim().parse().context("bad hour")?;
    let minute: u32 = m.trim().parse().context("bad minute")?;
    anyhow::ensure!(hour < 24 && minute < 60, "time out of range");
    Ok((hour, minute))
}
