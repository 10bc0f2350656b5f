//! Persistence layer — the append-only snapshot store.
//!
//! SQLite via sqlx. Snapshots are an immutable log: appends go through a
//! single serialized path and nothing is ever updated or deleted; the
//! "latest" view and per-symbol history are derived by query. Refresh
//! cycles are recorded alongside so the last cycle's per-source outcomes
//! survive restarts.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::types::{AccountCategory, CycleStatus, Holding, RefreshCycle, Snapshot, TrackerError};

/// Append-only snapshot history with a derived latest view.
pub struct SnapshotStore {
    pool: SqlitePool,
    /// Serializes the append path — single-writer discipline. Readers go
    /// straight to the pool (WAL keeps them consistent).
    append_lock: Mutex<()>,
}

impl SnapshotStore {
    /// Open (or create) the store at the given SQLite path.
    pub async fn open(path: &str) -> Result<Self, TrackerError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(store_err)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(store_err)?;

        let store = Self {
            pool,
            append_lock: Mutex::new(()),
        };
        store.migrate().await?;

        info!(path, "Snapshot store opened");
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), TrackerError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS snapshots (
                cycle_id    INTEGER PRIMARY KEY,
                captured_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS holdings (
                cycle_id     INTEGER NOT NULL,
                symbol       TEXT NOT NULL,
                display_name TEXT NOT NULL,
                category     TEXT NOT NULL,
                quantity     TEXT NOT NULL,
                unit_price   TEXT NOT NULL,
                valuation    TEXT NOT NULL,
                currency     TEXT NOT NULL,
                as_of_date   TEXT NOT NULL,
                PRIMARY KEY (cycle_id, symbol)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_holdings_symbol_date
             ON holdings (symbol, as_of_date)",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS refresh_cycles (
                cycle_id     INTEGER PRIMARY KEY,
                trigger_time TEXT NOT NULL,
                trading_date TEXT NOT NULL,
                status       TEXT NOT NULL,
                outcomes     TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    // -- Writes ----------------------------------------------------------

    /// Append a snapshot to the log.
    ///
    /// Returns `Ok(true)` when stored, `Ok(false)` when a snapshot with the
    /// same cycle_id already exists (idempotent re-append — safe trigger
    /// retry). Fails with `OrderingViolation` when `captured_at` precedes
    /// the stored maximum; the store is left untouched in that case.
    pub async fn append(&self, snapshot: &Snapshot) -> Result<bool, TrackerError> {
        let _guard = self.append_lock.lock().await;

        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let existing = sqlx::query("SELECT cycle_id FROM snapshots WHERE cycle_id = ?1")
            .bind(snapshot.cycle_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_err)?;
        if existing.is_some() {
            debug!(cycle_id = snapshot.cycle_id, "Duplicate snapshot append, no-op");
            return Ok(false);
        }

        let latest: Option<String> =
            sqlx::query_scalar("SELECT MAX(captured_at) FROM snapshots")
                .fetch_one(&mut *tx)
                .await
                .map_err(store_err)?;

        if let Some(latest) = latest.as_deref().and_then(parse_timestamp) {
            if snapshot.captured_at < latest {
                return Err(TrackerError::OrderingViolation {
                    cycle_id: snapshot.cycle_id,
                    attempted: snapshot.captured_at,
                    latest,
                });
            }
        }

        sqlx::query("INSERT INTO snapshots (cycle_id, captured_at) VALUES (?1, ?2)")
            .bind(snapshot.cycle_id)
            .bind(snapshot.captured_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        for h in &snapshot.holdings {
            sqlx::query(
                "INSERT INTO holdings
                 (cycle_id, symbol, display_name, category, quantity,
                  unit_price, valuation, currency, as_of_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(snapshot.cycle_id)
            .bind(&h.symbol)
            .bind(&h.display_name)
            .bind(h.category.as_str())
            .bind(h.quantity.to_string())
            .bind(h.unit_price.to_string())
            .bind(h.valuation.to_string())
            .bind(&h.currency)
            .bind(h.as_of_date.format("%Y-%m-%d").to_string())
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;

        info!(
            cycle_id = snapshot.cycle_id,
            holdings = snapshot.holdings.len(),
            "Snapshot appended"
        );
        Ok(true)
    }

    /// Record (or update) a refresh cycle's status and per-source outcomes.
    pub async fn record_cycle(&self, cycle: &RefreshCycle) -> Result<(), TrackerError> {
        let outcomes = serde_json::to_string(&cycle.outcomes)
            .map_err(|e| TrackerError::Store(e.to_string()))?;

        sqlx::query(
            "INSERT INTO refresh_cycles (cycle_id, trigger_time, trading_date, status, outcomes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (cycle_id) DO UPDATE SET
                 status = excluded.status,
                 outcomes = excluded.outcomes",
        )
        .bind(cycle.cycle_id)
        .bind(cycle.trigger_time.to_rfc3339())
        .bind(cycle.trading_date.format("%Y-%m-%d").to_string())
        .bind(cycle.status.as_str())
        .bind(outcomes)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    // -- Reads -----------------------------------------------------------

    /// The most recent snapshot, optionally restricted to one category.
    pub async fn latest(
        &self,
        category: Option<AccountCategory>,
    ) -> Result<Option<Snapshot>, TrackerError> {
        let row = sqlx::query(
            "SELECT cycle_id, captured_at FROM snapshots
             ORDER BY cycle_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        let Some(row) = row else { return Ok(None) };
        let cycle_id: i64 = row.get("cycle_id");
        let captured_at = parse_timestamp(row.get::<String, _>("captured_at").as_str())
            .ok_or_else(|| TrackerError::Store("unreadable captured_at".into()))?;

        let holdings = self.holdings_for_cycle(cycle_id).await?;
        let snapshot = Snapshot {
            cycle_id,
            captured_at,
            holdings,
        };

        Ok(Some(match category {
            Some(cat) => snapshot.filtered(cat),
            None => snapshot,
        }))
    }

    /// Per-symbol valuation history, ascending by as-of date.
    ///
    /// Carry-forward means consecutive snapshots can repeat the same as-of
    /// date for a symbol; one entry per date is returned (the latest
    /// cycle's). The result is a plain vector — finite and re-iterable.
    pub async fn history(
        &self,
        symbol: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Holding>, TrackerError> {
        let rows = sqlx::query(
            "SELECT cycle_id, symbol, display_name, category, quantity,
                    unit_price, valuation, currency, as_of_date
             FROM holdings WHERE symbol = ?1
             ORDER BY as_of_date ASC, cycle_id ASC",
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut history: Vec<Holding> = Vec::with_capacity(rows.len());
        for row in rows {
            let holding = holding_from_row(&row)?;
            if from.is_some_and(|f| holding.as_of_date < f)
                || to.is_some_and(|t| holding.as_of_date > t)
            {
                continue;
            }
            // Same date re-appended by a later cycle supersedes the entry.
            match history.last() {
                Some(last) if last.as_of_date == holding.as_of_date => {
                    *history.last_mut().expect("non-empty") = holding;
                }
                _ => history.push(holding),
            }
        }

        Ok(history)
    }

    /// The most recently recorded refresh cycle.
    pub async fn last_cycle(&self) -> Result<Option<RefreshCycle>, TrackerError> {
        let row = sqlx::query(
            "SELECT cycle_id, trigger_time, trading_date, status, outcomes
             FROM refresh_cycles ORDER BY cycle_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        let Some(row) = row else { return Ok(None) };

        let trigger_time = parse_timestamp(row.get::<String, _>("trigger_time").as_str())
            .ok_or_else(|| TrackerError::Store("unreadable trigger_time".into()))?;
        let trading_date =
            NaiveDate::parse_from_str(row.get::<String, _>("trading_date").as_str(), "%Y-%m-%d")
                .map_err(|e| TrackerError::Store(e.to_string()))?;
        let status: CycleStatus = row
            .get::<String, _>("status")
            .parse()
            .map_err(|e: anyhow::Error| TrackerError::Store(e.to_string()))?;
        let outcomes = serde_json::from_str(row.get::<String, _>("outcomes").as_str())
            .map_err(|e| TrackerError::Store(e.to_string()))?;

        Ok(Some(RefreshCycle {
            cycle_id: row.get("cycle_id"),
            trigger_time,
            trading_date,
            status,
            outcomes,
        }))
    }

    /// The next free cycle identifier (monotonically increasing across
    /// both snapshots and recorded cycles).
    pub async fn next_cycle_id(&self) -> Result<i64, TrackerError> {
        let max: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(id) FROM (
                 SELECT MAX(cycle_id) AS id FROM snapshots
                 UNION ALL
                 SELECT MAX(cycle_id) AS id FROM refresh_cycles
             )",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(max.unwrap_or(0) + 1)
    }

    async fn holdings_for_cycle(&self, cycle_id: i64) -> Result<Vec<Holding>, TrackerError> {
        let rows = sqlx::query(
            "SELECT cycle_id, symbol, display_name, category, quantity,
                    unit_price, valuation, currency, as_of_date
             FROM holdings WHERE cycle_id = ?1 ORDER BY symbol ASC",
        )
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter().map(holding_from_row).collect()
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn store_err(e: impl std::fmt::Display) -> TrackerError {
    TrackerError::Store(e.to_string())
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn holding_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Holding, TrackerError> {
    let decimal = |col: &str| -> Result<Decimal, TrackerError> {
        Decimal::from_str(row.get::<String, _>(col).as_str()).map_err(store_err)
    };

    Ok(Holding {
        symbol: row.get("symbol"),
        display_name: row.get("display_name"),
        category: row
            .get::<String, _>("category")
            .parse()
            .map_err(|e: anyhow::Error| store_err(e))?,
        quantity: decimal("quantity")?,
        unit_price: decimal("unit_price")?,
        valuation: decimal("valuation")?,
        currency: row.get("currency"),
        as_of_date: NaiveDate::parse_from_str(
            row.get::<String, _>("as_of_date").as_str(),
            "%Y-%m-%d",
        )
        .map_err(store_err)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
