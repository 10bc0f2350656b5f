//! Change detection between consecutive snapshots.
//!
//! Pure diffing — the detector reads two snapshots and produces transient
//! change records; it never persists anything. Ordering of the result is
//! deterministic (|delta| descending, symbol ascending) so notification
//! messages are reproducible.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::types::{ChangeKind, ChangeRecord, Holding, Snapshot};

/// Diff two snapshots.
///
/// - symbol only in `current`  → `Added`
/// - symbol only in `previous` → `Removed`
/// - in both with a different unit price → `PriceChange`, where
///   `delta_pct` is None when the previous price was zero.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<ChangeRecord> {
    let prev_map: BTreeMap<&str, &Holding> = previous
        .holdings
        .iter()
        .map(|h| (h.symbol.as_str(), h))
        .collect();
    let curr_map: BTreeMap<&str, &Holding> = current
        .holdings
        .iter()
        .map(|h| (h.symbol.as_str(), h))
        .collect();

    let mut changes = Vec::new();

    for (symbol, curr) in &curr_map {
        match prev_map.get(symbol) {
            None => changes.push(ChangeRecord {
                symbol: curr.symbol.clone(),
                display_name: curr.display_name.clone(),
                kind: ChangeKind::Added,
                previous_price: None,
                new_price: Some(curr.unit_price),
                delta: Decimal::ZERO,
                delta_pct: None,
            }),
            Some(prev) if prev.unit_price != curr.unit_price => {
                let delta = curr.unit_price - prev.unit_price;
                let delta_pct = if prev.unit_price == Decimal::ZERO {
                    None
                } else {
                    Some(delta / prev.unit_price)
                };
                changes.push(ChangeRecord {
                    symbol: curr.symbol.clone(),
                    display_name: curr.display_name.clone(),
                    kind: ChangeKind::PriceChange,
                    previous_price: Some(prev.unit_price),
                    new_price: Some(curr.unit_price),
                    delta,
                    delta_pct,
                });
            }
            Some(_) => {} // unchanged
        }
    }

    for (symbol, prev) in &prev_map {
        if !curr_map.contains_key(symbol) {
            changes.push(ChangeRecord {
                symbol: prev.symbol.clone(),
                display_name: prev.display_name.clone(),
                kind: ChangeKind::Removed,
                previous_price: Some(prev.unit_price),
                new_price: None,
                delta: Decimal::ZERO,
                delta_pct: None,
            });
        }
    }

    // |delta| descending, ties by symbol ascending.
    changes.sort_by(|a, b| {
        b.delta
            .abs()
            .cmp(&a.delta.abs())
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    changes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
