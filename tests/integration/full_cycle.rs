//! End-to-end refresh cycle tests.
//!
//! Drives the scheduler → store → detector pipeline with deterministic
//! mock sources and checks the cross-module properties: carry-forward on
//! partial failure, append idempotence, monotonic history, and
//! notification-ordered change records.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use moa::engine::scheduler::UpdateScheduler;
use moa::providers::QuoteSource;
use moa::store::SnapshotStore;
use moa::types::{AccountCategory, ChangeKind, CycleStatus, Holding, Snapshot};

use super::mock_source::MockSource;

fn temp_db() -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("moa_it_{}.db", uuid::Uuid::new_v4()));
    p.to_string_lossy().to_string()
}

async fn open_store() -> Arc<SnapshotStore> {
    Arc::new(SnapshotStore::open(&temp_db()).await.unwrap())
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
}

fn holding(symbol: &str, category: AccountCategory, price: Decimal, as_of: NaiveDate) -> Holding {
    Holding::new(symbol, format!("{symbol} 종목"), category, dec!(10), price, as_of)
}

fn scheduler_with(
    store: &Arc<SnapshotStore>,
    sources: Vec<Arc<MockSource>>,
) -> UpdateScheduler {
    let sources = sources
        .into_iter()
        .map(|s| s as Arc<dyn QuoteSource>)
        .collect();
    UpdateScheduler::new(sources, Arc::clone(store), (16, 0))
}

#[tokio::test]
async fn test_two_cycle_pipeline_produces_ordered_changes() {
    let store = open_store().await;

    let krx = Arc::new(MockSource::new(
        "krx",
        AccountCategory::DomesticStock,
        vec![
            holding("005930", AccountCategory::DomesticStock, dec!(70000), date(19)),
            holding("000660", AccountCategory::DomesticStock, dec!(200000), date(19)),
        ],
    ));
    let pension = Arc::new(MockSource::new(
        "pension-etf",
        AccountCategory::PensionEtf,
        vec![holding("360750", AccountCategory::PensionEtf, dec!(18500), date(19))],
    ));
    let scheduler = scheduler_with(&store, vec![Arc::clone(&krx), Arc::clone(&pension)]);

    // Day one: everything is new.
    let report = scheduler.trigger(true).await.unwrap().unwrap();
    assert_eq!(report.cycle.status, CycleStatus::Succeeded);
    assert_eq!(report.changes.len(), 3);
    assert!(report.changes.iter().all(|c| c.kind == ChangeKind::Added));

    // Day two: prices move by different magnitudes.
    krx.set_holdings(vec![
        holding("005930", AccountCategory::DomesticStock, dec!(71200), date(20)), // Δ +1,200
        holding("000660", AccountCategory::DomesticStock, dec!(195000), date(20)), // Δ −5,000
    ]);
    pension.set_holdings(vec![
        holding("360750", AccountCategory::PensionEtf, dec!(18500), date(20)), // unchanged
    ]);

    let report = scheduler.trigger(true).await.unwrap().unwrap();
    assert_eq!(report.cycle.status, CycleStatus::Succeeded);

    // Largest |delta| first; the unchanged ETF does not appear.
    let symbols: Vec<&str> = report.changes.iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["000660", "005930"]);
    assert_eq!(report.changes[0].delta, dec!(-5000));
    assert_eq!(report.changes[1].delta, dec!(1200));
    assert_eq!(report.changes[1].delta_pct, Some(dec!(1200) / dec!(70000)));
}

#[tokio::test]
async fn test_partial_failure_carries_forward_end_to_end() {
    let store = open_store().await;

    let krx = Arc::new(MockSource::new(
        "krx",
        AccountCategory::DomesticStock,
        vec![holding("005930", AccountCategory::DomesticStock, dec!(70000), date(19))],
    ));
    let pension = Arc::new(MockSource::new(
        "pension-etf",
        AccountCategory::PensionEtf,
        vec![holding("360750", AccountCategory::PensionEtf, dec!(18500), date(19))],
    ));
    let scheduler = scheduler_with(&store, vec![Arc::clone(&krx), Arc::clone(&pension)]);

    scheduler.trigger(true).await.unwrap().unwrap();

    // Next cycle: the pension provider is down.
    krx.set_holdings(vec![holding(
        "005930",
        AccountCategory::DomesticStock,
        dec!(71200),
        date(20),
    )]);
    pension.set_error("HTTP 503: upstream maintenance");

    let report = scheduler.trigger(true).await.unwrap().unwrap();
    assert_eq!(report.cycle.status, CycleStatus::PartialFailure);

    // The snapshot still covers both categories; the pension fund kept its
    // old price and — crucially — its old as-of date, which is how
    // staleness stays visible downstream.
    let snapshot = report.snapshot.unwrap();
    let carried = snapshot.find("360750").unwrap();
    assert_eq!(carried.unit_price, dec!(18500));
    assert_eq!(carried.as_of_date, date(19));
    assert_eq!(snapshot.find("005930").unwrap().as_of_date, date(20));

    // The recorded cycle marks the category stale.
    let recorded = store.last_cycle().await.unwrap().unwrap();
    assert_eq!(recorded.stale_categories(), vec![AccountCategory::PensionEtf]);

    // The carried holding is not reported as removed or changed.
    assert!(report.changes.iter().all(|c| c.symbol != "360750"));
}

#[tokio::test]
async fn test_total_failure_appends_nothing_then_recovers() {
    let store = open_store().await;

    let krx = Arc::new(MockSource::new(
        "krx",
        AccountCategory::DomesticStock,
        vec![holding("005930", AccountCategory::DomesticStock, dec!(70000), date(20))],
    ));
    let scheduler = scheduler_with(&store, vec![Arc::clone(&krx)]);

    krx.set_error("connection refused");
    let report = scheduler.trigger(false).await.unwrap().unwrap();
    assert_eq!(report.cycle.status, CycleStatus::Failed);
    assert!(report.snapshot.is_none());
    assert!(store.latest(None).await.unwrap().is_none());

    // The failed trading day is eligible for retry without force.
    krx.clear_error();
    let report = scheduler.trigger(false).await.unwrap().unwrap();
    assert_eq!(report.cycle.status, CycleStatus::Succeeded);
    assert_eq!(store.latest(None).await.unwrap().unwrap().holdings.len(), 1);

    // And once refreshed, the same day becomes a no-op.
    assert!(scheduler.trigger(false).await.unwrap().is_none());
    assert_eq!(krx.fetches(), 2);
}

#[tokio::test]
async fn test_append_idempotence_and_ordering_guard() {
    let store = open_store().await;

    let snapshot = Snapshot::new(
        1,
        Utc::now(),
        vec![holding("005930", AccountCategory::DomesticStock, dec!(70000), date(20))],
    );
    assert!(store.append(&snapshot).await.unwrap());
    assert!(!store.append(&snapshot).await.unwrap());

    let earlier = Snapshot::new(
        2,
        Utc::now() - chrono::Duration::hours(2),
        vec![holding("005930", AccountCategory::DomesticStock, dec!(69000), date(19))],
    );
    assert!(store.append(&earlier).await.is_err());

    // Exactly one snapshot stored, untouched.
    let latest = store.latest(None).await.unwrap().unwrap();
    assert_eq!(latest.cycle_id, 1);
    assert_eq!(latest.holdings[0].unit_price, dec!(70000));
}

#[tokio::test]
async fn test_history_is_monotonic_across_cycles() {
    let store = open_store().await;

    let krx = Arc::new(MockSource::new(
        "krx",
        AccountCategory::DomesticStock,
        vec![],
    ));
    let scheduler = scheduler_with(&store, vec![Arc::clone(&krx)]);

    for (day, price) in [(18u32, 69_500i64), (19, 70_000), (20, 71_200)] {
        krx.set_holdings(vec![holding(
            "005930",
            AccountCategory::DomesticStock,
            Decimal::from(price),
            date(day),
        )]);
        scheduler.trigger(true).await.unwrap().unwrap();
    }

    let history = store.history("005930", None, None).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history
        .windows(2)
        .all(|w| w[0].as_of_date <= w[1].as_of_date));
    assert_eq!(history.first().unwrap().unit_price, dec!(69500));
    assert_eq!(history.last().unwrap().unit_price, dec!(71200));

    // Re-iteration costs one more store read, nothing else.
    let again = store
        .history("005930", Some(date(19)), None)
        .await
        .unwrap();
    assert_eq!(again.len(), 2);
}
