//! Refresh-cycle scheduling and execution.
//!
//! One cycle at a time: `Pending → Running → {Succeeded, PartialFailure,
//! Failed}`. The scheduler owns the quote sources and the only write path
//! into the snapshot store. A trigger while a cycle is running is rejected
//! with `CycleInProgress`, never queued.
//!
//! Cancellation safety: the snapshot append happens only after every
//! source outcome has been collected, so dropping an in-flight `trigger`
//! future (process shutdown) appends nothing.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use super::detector;
use crate::providers::{recent_trading_date, QuoteSource};
use crate::store::SnapshotStore;
use crate::types::{
    ChangeRecord, CycleStatus, RefreshCycle, Snapshot, SourceOutcome, SourceResult, TrackerError,
};

/// Result of one completed refresh cycle, broadcast to consumers.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: RefreshCycle,
    /// The appended snapshot; absent when the cycle failed outright.
    pub snapshot: Option<Snapshot>,
    /// Diff against the previous latest snapshot, notification-ordered.
    pub changes: Vec<ChangeRecord>,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle #{} ({}): {} — {} holdings, {} changes",
            self.cycle.cycle_id,
            self.cycle.trading_date,
            self.cycle.status,
            self.snapshot.as_ref().map_or(0, |s| s.holdings.len()),
            self.changes.len(),
        )
    }
}

/// Drives the daily refresh. Construct once, share behind an `Arc`.
pub struct UpdateScheduler {
    sources: Vec<Arc<dyn QuoteSource>>,
    store: Arc<SnapshotStore>,
    /// Market close boundary (KST hour, minute).
    close: (u32, u32),
    /// Held for the duration of a cycle; `try_lock` failure means one is
    /// already running.
    running: Mutex<()>,
    events: broadcast::Sender<CycleReport>,
}

impl UpdateScheduler {
    pub fn new(
        sources: Vec<Arc<dyn QuoteSource>>,
        store: Arc<SnapshotStore>,
        close: (u32, u32),
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            sources,
            store,
            close,
            running: Mutex::new(()),
            events,
        }
    }

    /// Subscribe to completed-cycle events (cycles that appended a snapshot).
    pub fn subscribe(&self) -> broadcast::Receiver<CycleReport> {
        self.events.subscribe()
    }

    /// Trigger a refresh cycle.
    ///
    /// Returns `Ok(None)` when the current trading day has already been
    /// refreshed (unless `force`), `Err(CycleInProgress)` when another
    /// cycle holds the guard, and a report otherwise. A `Failed` cycle is
    /// not a trigger error — the report carries the failure outcomes and
    /// the next trigger for the same trading day will retry.
    pub async fn trigger(&self, force: bool) -> Result<Option<CycleReport>, TrackerError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| TrackerError::CycleInProgress)?;

        let now = Utc::now();
        let trading_date = recent_trading_date(now, self.close);

        if !force {
            if let Some(last) = self.store.last_cycle().await? {
                let refreshed = matches!(
                    last.status,
                    CycleStatus::Succeeded | CycleStatus::PartialFailure
                );
                if last.trading_date == trading_date && refreshed {
                    return Ok(None);
                }
            }
        }

        let cycle_id = self.store.next_cycle_id().await?;
        let mut cycle = RefreshCycle::new(cycle_id, now, trading_date);
        cycle.status = CycleStatus::Running;
        self.store.record_cycle(&cycle).await?;

        info!(
            cycle_id,
            trading_date = %trading_date,
            sources = self.sources.len(),
            force,
            "Refresh cycle starting"
        );

        let prior = self.store.latest(None).await?;

        // Fetch every source concurrently; collect all outcomes before
        // anything is written.
        let fetches = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                let result = source.collect().await;
                (source.name().to_string(), source.category(), result)
            }
        });
        let results = futures::future::join_all(fetches).await;

        let mut holdings = Vec::new();
        for (name, category, result) in results {
            match result {
                Ok(fresh) => {
                    cycle.outcomes.push(SourceOutcome {
                        source: name,
                        category,
                        result: SourceResult::Fresh {
                            holdings: fresh.len(),
                        },
                    });
                    holdings.extend(fresh);
                }
                Err(e) => {
                    // Stale-data carry-forward: reuse the prior snapshot's
                    // holdings for this category so consumers never see it
                    // vanish on a transient scrape failure.
                    let carried: Vec<_> = prior
                        .as_ref()
                        .map(|p| p.holdings_in(category).into_iter().cloned().collect())
                        .unwrap_or_default();

                    if carried.is_empty() {
                        warn!(source = %name, error = %e, "Source failed, nothing to carry forward");
                        cycle.outcomes.push(SourceOutcome {
                            source: name,
                            category,
                            result: SourceResult::Failed {
                                reason: e.to_string(),
                            },
                        });
                    } else {
                        warn!(
                            source = %name,
                            error = %e,
                            carried = carried.len(),
                            "Source failed, carrying forward prior holdings"
                        );
                        cycle.outcomes.push(SourceOutcome {
                            source: name,
                            category,
                            result: SourceResult::CarriedForward {
                                holdings: carried.len(),
                                reason: e.to_string(),
                            },
                        });
                        holdings.extend(carried);
                    }
                }
            }
        }

        cycle.resolve_status();

        if cycle.status == CycleStatus::Failed {
            error!(cycle_id, "All sources failed — no snapshot appended");
            self.store.record_cycle(&cycle).await?;
            return Ok(Some(CycleReport {
                cycle,
                snapshot: None,
                changes: Vec::new(),
            }));
        }

        let snapshot = Snapshot::new(cycle_id, now, holdings);

        // Store refusal aborts the cycle — no partial write is acceptable.
        if let Err(e) = self.store.append(&snapshot).await {
            error!(cycle_id, error = %e, "Snapshot append refused, cycle failed");
            cycle.status = CycleStatus::Failed;
            // Best effort — the append error is the one worth surfacing.
            if let Err(rec) = self.store.record_cycle(&cycle).await {
                error!(cycle_id, error = %rec, "Failed to record aborted cycle");
            }
            return Err(e);
        }

        self.store.record_cycle(&cycle).await?;

        let empty = Snapshot::new(0, now, Vec::new());
        let changes = detector::diff(prior.as_ref().unwrap_or(&empty), &snapshot);

        let report = CycleReport {
            cycle,
            snapshot: Some(snapshot),
            changes,
        };

        info!(
            cycle_id,
            status = %report.cycle.status,
            holdings = report.snapshot.as_ref().map_or(0, |s| s.holdings.len()),
            changes = report.changes.len(),
            "Refresh cycle complete"
        );

        // Receivers may come and go; a send with no listeners is fine.
        let _ = self.events.send(report.clone());

        Ok(Some(report))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
