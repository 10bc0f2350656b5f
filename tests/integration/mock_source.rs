//! Mock quote source for integration testing.
//!
//! Provides a deterministic `QuoteSource` implementation backed by
//! in-memory holdings — no network. Prices and failure behavior are
//! fully controllable from test code.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use moa::providers::QuoteSource;
use moa::types::{AccountCategory, Holding, TrackerError};

/// A scriptable quote source.
pub struct MockSource {
    name: String,
    category: AccountCategory,
    holdings: Arc<Mutex<Vec<Holding>>>,
    /// If set, fetch fails with this message.
    force_error: Arc<Mutex<Option<String>>>,
    fetch_count: Arc<Mutex<usize>>,
}

impl MockSource {
    pub fn new(name: &str, category: AccountCategory, holdings: Vec<Holding>) -> Self {
        Self {
            name: name.to_string(),
            category,
            holdings: Arc::new(Mutex::new(holdings)),
            force_error: Arc::new(Mutex::new(None)),
            fetch_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Force all subsequent fetches to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Replace the holdings served by this source.
    pub fn set_holdings(&self, holdings: Vec<Holding>) {
        *self.holdings.lock().unwrap() = holdings;
    }

    pub fn fetches(&self) -> usize {
        *self.fetch_count.lock().unwrap()
    }
}

#[async_trait]
impl QuoteSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> AccountCategory {
        self.category
    }

    async fn fetch(&self) -> Result<serde_json::Value, TrackerError> {
        *self.fetch_count.lock().unwrap() += 1;

        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(TrackerError::fetch(&self.name, msg, true));
        }

        let holdings = self.holdings.lock().unwrap().clone();
        serde_json::to_value(holdings).map_err(|e| TrackerError::parse(&self.name, e))
    }

    fn normalize(&self, raw: &serde_json::Value) -> Result<Vec<Holding>, TrackerError> {
        serde_json::from_value(raw.clone()).map_err(|e| TrackerError::parse(&self.name, e))
    }
}
