//! Shared types for the MOA tracker.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that provider, engine,
//! and store modules can depend on them without circular references.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Account category
// ---------------------------------------------------------------------------

/// Which account a holding belongs to. One quote source per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountCategory {
    /// Regular brokerage account — KRX-listed stocks.
    DomesticStock,
    /// Pension-savings account — KRX-listed ETFs.
    PensionEtf,
}

impl AccountCategory {
    /// All known categories (useful for iteration).
    pub const ALL: &'static [AccountCategory] =
        &[AccountCategory::DomesticStock, AccountCategory::PensionEtf];

    /// Stable identifier used in the database and query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountCategory::DomesticStock => "domestic-stock",
            AccountCategory::PensionEtf => "pension-etf",
        }
    }
}

impl fmt::Display for AccountCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountCategory::DomesticStock => write!(f, "Domestic stock"),
            AccountCategory::PensionEtf => write!(f, "Pension ETF"),
        }
    }
}

/// Attempt to parse a string into an AccountCategory (case-insensitive).
impl std::str::FromStr for AccountCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "domestic-stock" | "domestic" | "stock" | "stocks" => {
                Ok(AccountCategory::DomesticStock)
            }
            "pension-etf" | "pension" | "etf" | "etfs" => Ok(AccountCategory::PensionEtf),
            _ => Err(anyhow::anyhow!("Unknown account category: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Holding
// ---------------------------------------------------------------------------

/// A single tracked position as of one market-close date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    /// Provider-specific identifier (6-digit KRX ticker, e.g. "005930").
    pub symbol: String,
    pub display_name: String,
    pub category: AccountCategory,
    /// Units held. Non-negative.
    pub quantity: Decimal,
    /// Closing price per unit. Non-negative, denominated in `currency`.
    pub unit_price: Decimal,
    /// quantity × unit_price, precomputed at normalization time.
    pub valuation: Decimal,
    pub currency: String,
    /// The market-close date this valuation refers to.
    pub as_of_date: NaiveDate,
}

impl Holding {
    /// Build a holding, deriving the valuation from quantity × price.
    pub fn new(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        category: AccountCategory,
        quantity: Decimal,
        unit_price: Decimal,
        as_of_date: NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            category,
            quantity,
            unit_price,
            valuation: quantity * unit_price,
            currency: "KRW".to_string(),
            as_of_date,
        }
    }

    /// Whether quantity and price satisfy the non-negativity invariant.
    pub fn is_valid(&self) -> bool {
        self.quantity >= Decimal::ZERO && self.unit_price >= Decimal::ZERO
    }

    /// Helper to build a test holding with sensible defaults.
    #[cfg(test)]
    pub fn sample(symbol: &str, price: i64) -> Self {
        use rust_decimal_macros::dec;
        Holding::new(
            symbol,
            format!("Test {symbol}"),
            AccountCategory::DomesticStock,
            dec!(10),
            Decimal::from(price),
            NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
        )
    }
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) {} × {} = {} {} (as of {})",
            self.category,
            self.display_name,
            self.symbol,
            self.quantity,
            self.unit_price,
            self.valuation,
            self.currency,
            self.as_of_date,
        )
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An immutable capture of all holdings' valuations from one refresh cycle.
///
/// Holdings are unique by symbol; the constructor drops later duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Monotonically increasing cycle identifier.
    pub cycle_id: i64,
    pub captured_at: DateTime<Utc>,
    pub holdings: Vec<Holding>,
}

impl Snapshot {
    pub fn new(cycle_id: i64, captured_at: DateTime<Utc>, holdings: Vec<Holding>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let holdings = holdings
            .into_iter()
            .filter(|h| seen.insert(h.symbol.clone()))
            .collect();
        Self {
            cycle_id,
            captured_at,
            holdings,
        }
    }

    /// Total valuation across all holdings.
    pub fn total_valuation(&self) -> Decimal {
        self.holdings.iter().map(|h| h.valuation).sum()
    }

    /// Total valuation for one account category.
    pub fn category_valuation(&self, category: AccountCategory) -> Decimal {
        self.holdings
            .iter()
            .filter(|h| h.category == category)
            .map(|h| h.valuation)
            .sum()
    }

    /// Holdings belonging to one category, in stored order.
    pub fn holdings_in(&self, category: AccountCategory) -> Vec<&Holding> {
        self.holdings
            .iter()
            .filter(|h| h.category == category)
            .collect()
    }

    /// Look up a holding by symbol.
    pub fn find(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    /// A copy of this snapshot restricted to one category.
    pub fn filtered(&self, category: AccountCategory) -> Snapshot {
        Snapshot {
            cycle_id: self.cycle_id,
            captured_at: self.captured_at,
            holdings: self
                .holdings
                .iter()
                .filter(|h| h.category == category)
                .cloned()
                .collect(),
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Snapshot #{}: {} holdings, total {} KRW ({})",
            self.cycle_id,
            self.holdings.len(),
            self.total_valuation(),
            self.captured_at.format("%Y-%m-%d %H:%M"),
        )
    }
}

// ---------------------------------------------------------------------------
// Refresh cycle
// ---------------------------------------------------------------------------

/// Lifecycle status of one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleStatus {
    Pending,
    Running,
    Succeeded,
    PartialFailure,
    Failed,
}

impl CycleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CycleStatus::Succeeded | CycleStatus::PartialFailure | CycleStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Pending => "pending",
            CycleStatus::Running => "running",
            CycleStatus::Succeeded => "succeeded",
            CycleStatus::PartialFailure => "partial-failure",
            CycleStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CycleStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CycleStatus::Pending),
            "running" => Ok(CycleStatus::Running),
            "succeeded" => Ok(CycleStatus::Succeeded),
            "partial-failure" => Ok(CycleStatus::PartialFailure),
            "failed" => Ok(CycleStatus::Failed),
            _ => Err(anyhow::anyhow!("Unknown cycle status: {s}")),
        }
    }
}

/// How one quote source fared within a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceResult {
    /// Fetched and normalized this cycle.
    Fresh { holdings: usize },
    /// The fetch failed; the prior snapshot's holdings were reused.
    CarriedForward { holdings: usize, reason: String },
    /// The fetch failed and no prior data existed to carry forward.
    Failed { reason: String },
}

impl SourceResult {
    pub fn is_fresh(&self) -> bool {
        matches!(self, SourceResult::Fresh { .. })
    }
}

/// Per-source outcome recorded on a refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    pub category: AccountCategory,
    pub result: SourceResult,
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            SourceResult::Fresh { holdings } => {
                write!(f, "{}: fresh ({holdings} holdings)", self.source)
            }
            SourceResult::CarriedForward { holdings, reason } => write!(
                f,
                "{}: carried forward {holdings} holdings ({reason})",
                self.source
            ),
            SourceResult::Failed { reason } => write!(f, "{}: failed ({reason})", self.source),
        }
    }
}

/// One execution of the scheduled or manual refresh process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshCycle {
    pub cycle_id: i64,
    pub trigger_time: DateTime<Utc>,
    /// The market-close date this cycle refreshed data for.
    pub trading_date: NaiveDate,
    pub status: CycleStatus,
    pub outcomes: Vec<SourceOutcome>,
}

impl RefreshCycle {
    pub fn new(cycle_id: i64, trigger_time: DateTime<Utc>, trading_date: NaiveDate) -> Self {
        Self {
            cycle_id,
            trigger_time,
            trading_date,
            status: CycleStatus::Pending,
            outcomes: Vec::new(),
        }
    }

    /// Categories whose data in the appended snapshot is stale
    /// (carried forward from an earlier cycle).
    pub fn stale_categories(&self) -> Vec<AccountCategory> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, SourceResult::CarriedForward { .. }))
            .map(|o| o.category)
            .collect()
    }

    /// Derive the terminal status from the collected outcomes.
    pub fn resolve_status(&mut self) {
        let fresh = self.outcomes.iter().filter(|o| o.result.is_fresh()).count();
        self.status = if fresh == self.outcomes.len() {
            CycleStatus::Succeeded
        } else if fresh > 0
            || self
                .outcomes
                .iter()
                .any(|o| matches!(o.result, SourceResult::CarriedForward { .. }))
        {
            CycleStatus::PartialFailure
        } else {
            CycleStatus::Failed
        };
    }
}

impl fmt::Display for RefreshCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcomes: Vec<String> = self.outcomes.iter().map(|o| o.to_string()).collect();
        write!(
            f,
            "Cycle #{} ({}) — {} [{}]",
            self.cycle_id,
            self.trading_date,
            self.status,
            outcomes.join("; "),
        )
    }
}

// ---------------------------------------------------------------------------
// Change records
// ---------------------------------------------------------------------------

/// What kind of change a diff found for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    PriceChange,
    Added,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::PriceChange => write!(f, "price-change"),
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Removed => write!(f, "removed"),
        }
    }
}

/// A computed difference between two snapshots for one holding.
///
/// Transient — produced by the change detector, consumed by notifiers;
/// never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub symbol: String,
    pub display_name: String,
    pub kind: ChangeKind,
    pub previous_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
    /// new_price − previous_price (zero for added/removed entries).
    pub delta: Decimal,
    /// delta / previous_price. None when the previous price was zero
    /// or the symbol was added/removed.
    pub delta_pct: Option<Decimal>,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChangeKind::Added => write!(
                f,
                "+ {} ({}) @ {}",
                self.display_name,
                self.symbol,
                self.new_price.unwrap_or_default(),
            ),
            ChangeKind::Removed => write!(
                f,
                "- {} ({}) was {}",
                self.display_name,
                self.symbol,
                self.previous_price.unwrap_or_default(),
            ),
            ChangeKind::PriceChange => {
                let sign = if self.delta >= Decimal::ZERO { "+" } else { "" };
                match self.delta_pct {
                    Some(pct) => write!(
                        f,
                        "{} ({}): {} → {} ({sign}{}, {sign}{:.2}%)",
                        self.display_name,
                        self.symbol,
                        self.previous_price.unwrap_or_default(),
                        self.new_price.unwrap_or_default(),
                        self.delta,
                        pct * Decimal::from(100),
                    ),
                    None => write!(
                        f,
                        "{} ({}): {} → {} ({sign}{})",
                        self.display_name,
                        self.symbol,
                        self.previous_price.unwrap_or_default(),
                        self.new_price.unwrap_or_default(),
                        self.delta,
                    ),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for MOA.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Transient network/provider failure. Retried with bounded backoff.
    #[error("fetch failed ({origin}): {message}")]
    Fetch {
        origin: String,
        message: String,
        /// Whether the fetch helper may retry this failure.
        retryable: bool,
    },

    /// Malformed provider payload. Not retried.
    #[error("malformed payload ({origin}): {message}")]
    Parse { origin: String, message: String },

    /// Attempted out-of-order snapshot append.
    #[error(
        "out-of-order append: cycle {cycle_id} captured at {attempted} \
         precedes stored latest {latest}"
    )]
    OrderingViolation {
        cycle_id: i64,
        attempted: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    /// A refresh was triggered while another cycle is running.
    #[error("a refresh cycle is already in progress")]
    CycleInProgress,

    /// Durable storage is not reachable or refused the operation.
    #[error("snapshot store unavailable: {0}")]
    Store(String),
}

impl TrackerError {
    pub fn fetch(source: &str, message: impl fmt::Display, retryable: bool) -> Self {
        TrackerError::Fetch {
            origin: source.to_string(),
            message: message.to_string(),
            retryable,
        }
    }

    pub fn parse(source: &str, message: impl fmt::Display) -> Self {
        TrackerError::Parse {
            origin: source.to_string(),
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // -- AccountCategory tests --

    #[test]
    fn test_category_display() {
        assert_eq!(format!("{}", AccountCategory::DomesticStock), "Domestic stock");
        assert_eq!(format!("{}", AccountCategory::PensionEtf), "Pension ETF");
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!(
            "domestic-stock".parse::<AccountCategory>().unwrap(),
            AccountCategory::DomesticStock
        );
        assert_eq!(
            "STOCK".parse::<AccountCategory>().unwrap(),
            AccountCategory::DomesticStock
        );
        assert_eq!(
            "pension".parse::<AccountCategory>().unwrap(),
            AccountCategory::PensionEtf
        );
        assert_eq!(
            "etf".parse::<AccountCategory>().unwrap(),
            AccountCategory::PensionEtf
        );
        assert!("crypto".parse::<AccountCategory>().is_err());
    }

    #[test]
    fn test_category_as_str_round_trips() {
        for cat in AccountCategory::ALL {
            assert_eq!(cat.as_str().parse::<AccountCategory>().unwrap(), *cat);
        }
    }

    // -- Holding tests --

    #[test]
    fn test_holding_new_computes_valuation() {
        let h = Holding::new(
            "005930",
            "삼성전자",
            AccountCategory::DomesticStock,
            dec!(12),
            dec!(71200),
            date(2026, 2, 20),
        );
        assert_eq!(h.valuation, dec!(854400));
        assert_eq!(h.currency, "KRW");
        assert!(h.is_valid());
    }

    #[test]
    fn test_holding_invalid_negative_quantity() {
        let mut h = Holding::sample("005930", 71_200);
        h.quantity = dec!(-1);
        assert!(!h.is_valid());
    }

    #[test]
    fn test_holding_display() {
        let h = Holding::sample("005930", 71_200);
        let s = format!("{h}");
        assert!(s.contains("005930"));
        assert!(s.contains("71200"));
    }

    #[test]
    fn test_holding_serialization_roundtrip() {
        let h = Holding::sample("069500", 34_500);
        let json = serde_json::to_string(&h).unwrap();
        let parsed: Holding = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.symbol, "069500");
        assert_eq!(parsed.as_of_date, h.as_of_date);
    }

    // -- Snapshot tests --

    fn sample_snapshot() -> Snapshot {
        let mut etf = Holding::sample("069500", 34_500);
        etf.category = AccountCategory::PensionEtf;
        Snapshot::new(
            1,
            Utc::now(),
            vec![Holding::sample("005930", 71_200), etf],
        )
    }

    #[test]
    fn test_snapshot_totals() {
        let snap = sample_snapshot();
        // 10 × 71,200 + 10 × 34,500
        assert_eq!(snap.total_valuation(), dec!(1057000));
        assert_eq!(
            snap.category_valuation(AccountCategory::DomesticStock),
            dec!(712000)
        );
        assert_eq!(
            snap.category_valuation(AccountCategory::PensionEtf),
            dec!(345000)
        );
    }

    #[test]
    fn test_snapshot_dedups_by_symbol() {
        let snap = Snapshot::new(
            1,
            Utc::now(),
            vec![
                Holding::sample("005930", 71_200),
                Holding::sample("005930", 99_999),
            ],
        );
        assert_eq!(snap.holdings.len(), 1);
        assert_eq!(snap.holdings[0].unit_price, dec!(71200));
    }

    #[test]
    fn test_snapshot_find_and_filter() {
        let snap = sample_snapshot();
        assert!(snap.find("005930").is_some());
        assert!(snap.find("000000").is_none());

        let pension = snap.filtered(AccountCategory::PensionEtf);
        assert_eq!(pension.holdings.len(), 1);
        assert_eq!(pension.cycle_id, snap.cycle_id);
        assert_eq!(snap.holdings_in(AccountCategory::DomesticStock).len(), 1);
    }

    // -- CycleStatus tests --

    #[test]
    fn test_cycle_status_terminal() {
        assert!(!CycleStatus::Pending.is_terminal());
        assert!(!CycleStatus::Running.is_terminal());
        assert!(CycleStatus::Succeeded.is_terminal());
        assert!(CycleStatus::PartialFailure.is_terminal());
        assert!(CycleStatus::Failed.is_terminal());
    }

    #[test]
    fn test_cycle_status_round_trips() {
        for status in [
            CycleStatus::Pending,
            CycleStatus::Running,
            CycleStatus::Succeeded,
            CycleStatus::PartialFailure,
            CycleStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<CycleStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<CycleStatus>().is_err());
    }

    // -- RefreshCycle tests --

    fn outcome(source: &str, category: AccountCategory, result: SourceResult) -> SourceOutcome {
        SourceOutcome {
            source: source.to_string(),
            category,
            result,
        }
    }

    #[test]
    fn test_resolve_status_all_fresh() {
        let mut cycle = RefreshCycle::new(1, Utc::now(), date(2026, 2, 20));
        cycle.outcomes = vec![
            outcome(
                "krx",
                AccountCategory::DomesticStock,
                SourceResult::Fresh { holdings: 3 },
            ),
            outcome(
                "pension",
                AccountCategory::PensionEtf,
                SourceResult::Fresh { holdings: 2 },
            ),
        ];
        cycle.resolve_status();
        assert_eq!(cycle.status, CycleStatus::Succeeded);
        assert!(cycle.stale_categories().is_empty());
    }

    #[test]
    fn test_resolve_status_partial() {
        let mut cycle = RefreshCycle::new(2, Utc::now(), date(2026, 2, 20));
        cycle.outcomes = vec![
            outcome(
                "krx",
                AccountCategory::DomesticStock,
                SourceResult::Fresh { holdings: 3 },
            ),
            outcome(
                "pension",
                AccountCategory::PensionEtf,
                SourceResult::CarriedForward {
                    holdings: 2,
                    reason: "timeout".to_string(),
                },
            ),
        ];
        cycle.resolve_status();
        assert_eq!(cycle.status, CycleStatus::PartialFailure);
        assert_eq!(cycle.stale_categories(), vec![AccountCategory::PensionEtf]);
    }

    #[test]
    fn test_resolve_status_all_failed() {
        let mut cycle = RefreshCycle::new(3, Utc::now(), date(2026, 2, 20));
        cycle.outcomes = vec![
            outcome(
                "krx",
                AccountCategory::DomesticStock,
                SourceResult::Failed {
                    reason: "timeout".to_string(),
                },
            ),
            outcome(
                "pension",
                AccountCategory::PensionEtf,
                SourceResult::Failed {
                    reason: "HTTP 503".to_string(),
                },
            ),
        ];
        cycle.resolve_status();
        assert_eq!(cycle.status, CycleStatus::Failed);
    }

    #[test]
    fn test_refresh_cycle_display() {
        let mut cycle = RefreshCycle::new(7, Utc::now(), date(2026, 2, 20));
        cycle.outcomes = vec![outcome(
            "krx",
            AccountCategory::DomesticStock,
            SourceResult::Fresh { holdings: 5 },
        )];
        cycle.resolve_status();
        let s = format!("{cycle}");
        assert!(s.contains("#7"));
        assert!(s.contains("succeeded"));
        assert!(s.contains("krx"));
    }

    // -- ChangeRecord tests --

    #[test]
    fn test_change_record_display_price_change() {
        let rec = ChangeRecord {
            symbol: "005930".to_string(),
            display_name: "삼성전자".to_string(),
            kind: ChangeKind::PriceChange,
            previous_price: Some(dec!(100)),
            new_price: Some(dec!(110)),
            delta: dec!(10),
            delta_pct: Some(dec!(0.10)),
        };
        let s = format!("{rec}");
        assert!(s.contains("100"));
        assert!(s.contains("110"));
        assert!(s.contains("+10"));
        assert!(s.contains("10.00%"));
    }

    #[test]
    fn test_change_record_display_added_removed() {
        let added = ChangeRecord {
            symbol: "411060".to_string(),
            display_name: "ACE 금현물".to_string(),
            kind: ChangeKind::Added,
            previous_price: None,
            new_price: Some(dec!(15000)),
            delta: Decimal::ZERO,
            delta_pct: None,
        };
        assert!(format!("{added}").starts_with("+ "));

        let removed = ChangeRecord {
            kind: ChangeKind::Removed,
            previous_price: Some(dec!(15000)),
            new_price: None,
            ..added
        };
        assert!(format!("{removed}").starts_with("- "));
    }

    // -- TrackerError tests --

    #[test]
    fn test_error_display() {
        let e = TrackerError::fetch("krx", "connection timeout", true);
        assert_eq!(format!("{e}"), "fetch failed (krx): connection timeout");

        let e = TrackerError::CycleInProgress;
        assert!(format!("{e}").contains("already in progress"));

        let e = TrackerError::parse("pension", "missing closePrice");
        assert!(format!("{e}").contains("pension"));
    }
}
