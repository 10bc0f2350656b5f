//! Dashboard API route handlers.
//!
//! Read-only: every endpoint is a query against the snapshot store.
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::SnapshotStore;
use crate::types::{AccountCategory, Holding, SourceResult, TrackerError};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub store: Arc<SnapshotStore>,
}

impl DashboardState {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }
}

pub type AppState = Arc<DashboardState>;

/// Error shape every handler shares: status code + plain-text reason.
type ApiError = (StatusCode, String);

fn internal(e: TrackerError) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HoldingView {
    pub symbol: String,
    pub name: String,
    pub category: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub valuation: Decimal,
    pub currency: String,
    pub as_of_date: String,
}

impl From<&Holding> for HoldingView {
    fn from(h: &Holding) -> Self {
        Self {
            symbol: h.symbol.clone(),
            name: h.display_name.clone(),
            category: h.category.as_str().to_string(),
            quantity: h.quantity,
            unit_price: h.unit_price,
            valuation: h.valuation,
            currency: h.currency.clone(),
            as_of_date: h.as_of_date.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub holdings: usize,
    pub valuation: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatestResponse {
    pub cycle_id: i64,
    pub captured_at: String,
    pub total_valuation: Decimal,
    pub categories: Vec<CategorySummary>,
    pub holdings: Vec<HoldingView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeView {
    pub source: String,
    pub category: String,
    /// "fresh" | "carried-forward" | "failed"
    pub state: String,
    pub holdings: usize,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleResponse {
    pub cycle_id: i64,
    pub trigger_time: String,
    pub trading_date: String,
    pub status: String,
    pub outcomes: Vec<OutcomeView>,
    /// Categories whose latest data is carried forward, i.e. stale.
    pub stale_categories: Vec<String>,
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LatestParams {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/latest?category=
pub async fn get_latest(
    State(state): State<AppState>,
    Query(params): Query<LatestParams>,
) -> Result<Json<LatestResponse>, ApiError> {
    let category = match params.category.as_deref() {
        Some(raw) => Some(
            raw.parse::<AccountCategory>()
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        ),
        None => None,
    };

    let snapshot = state
        .store
        .latest(category)
        .await
        .map_err(internal)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "no snapshot yet".to_string()))?;

    let categories = AccountCategory::ALL
        .iter()
        .filter(|c| category.is_none() || category == Some(**c))
        .map(|c| CategorySummary {
            category: c.as_str().to_string(),
            holdings: snapshot.holdings_in(*c).len(),
            valuation: snapshot.category_valuation(*c),
        })
        .collect();

    Ok(Json(LatestResponse {
        cycle_id: snapshot.cycle_id,
        captured_at: snapshot.captured_at.to_rfc3339(),
        total_valuation: snapshot.total_valuation(),
        categories,
        holdings: snapshot.holdings.iter().map(HoldingView::from).collect(),
    }))
}

/// GET /api/history/:symbol?from=&to=
pub async fn get_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HoldingView>>, ApiError> {
    let history = state
        .store
        .history(&symbol, params.from, params.to)
        .await
        .map_err(internal)?;

    Ok(Json(history.iter().map(HoldingView::from).collect()))
}

/// GET /api/cycle — the last refresh cycle's status and per-source outcomes.
pub async fn get_cycle(State(state): State<AppState>) -> Result<Json<CycleResponse>, ApiError> {
    let cycle = state
        .store
        .last_cycle()
        .await
        .map_err(internal)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "no cycle recorded yet".to_string()))?;

    let outcomes = cycle
        .outcomes
        .iter()
        .map(|o| {
            let (state, holdings, reason) = match &o.result {
                SourceResult::Fresh { holdings } => ("fresh", *holdings, None),
                SourceResult::CarriedForward { holdings, reason } => {
                    ("carried-forward", *holdings, Some(reason.clone()))
                }
                SourceResult::Failed { reason } => ("failed", 0, Some(reason.clone())),
            };
            OutcomeView {
                source: o.source.clone(),
                category: o.category.as_str().to_string(),
                state: state.to_string(),
                holdings,
                reason,
            }
        })
        .collect();

    Ok(Json(CycleResponse {
        cycle_id: cycle.cycle_id,
        trigger_time: cycle.trigger_time.to_rfc3339(),
        trading_date: cycle.trading_date.format("%Y-%m-%d").to_string(),
        status: cycle.status.to_string(),
        outcomes,
        stale_categories: cycle
            .stale_categories()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect(),
    }))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
