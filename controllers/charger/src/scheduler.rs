//! Periodic reconciliation loop.
//!
//! Each cycle reads every charger record once and reconciles them with
//! bounded concurrency. Cycles never overlap: the loop awaits a cycle before
//! waiting for the next tick, and a cycle that overruns the interval is
//! followed immediately by the next one.

use crate::metrics::Metrics;
use crate::reconciler::{ChargerOutcome, Reconciler};
use charger_store::ChargerStoreTrait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Loop timing and concurrency
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Time between cycle starts
    pub interval: Duration,
    /// Timeout of the bulk status read
    pub fetch_timeout: Duration,
    /// Maximum number of chargers reconciled at once
    pub max_concurrency: usize,
}

/// Summary of one reconciliation cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// The status read failed or timed out; nothing was reconciled
    pub fetch_failed: bool,
    pub records: usize,
    pub created: usize,
    pub deleted: usize,
    pub respawned: usize,
    pub unchanged: usize,
    pub deferred: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Deferred and skipped chargers by reason
    pub reasons: BTreeMap<&'static str, usize>,
    pub duration: Duration,
}

impl CycleReport {
    /// Empty report for a cycle starting now
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            fetch_failed: false,
            records: 0,
            created: 0,
            deleted: 0,
            respawned: 0,
            unchanged: 0,
            deferred: 0,
            skipped: 0,
            failed: 0,
            reasons: BTreeMap::new(),
            duration: Duration::ZERO,
        }
    }

    fn record(&mut self, outcome: &ChargerOutcome) {
        match outcome {
            ChargerOutcome::Unchanged => self.unchanged += 1,
            ChargerOutcome::Created => self.created += 1,
            ChargerOutcome::Deleted => self.deleted += 1,
            ChargerOutcome::Respawned => self.respawned += 1,
            ChargerOutcome::Deferred(reason) => {
                self.deferred += 1;
                *self.reasons.entry(reason.as_str()).or_default() += 1;
            }
            ChargerOutcome::Skipped(reason) => {
                self.skipped += 1;
                *self.reasons.entry(reason.as_str()).or_default() += 1;
            }
            ChargerOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Number of workloads changed in this cycle
    pub fn changed(&self) -> usize {
        self.created + self.deleted + self.respawned
    }

    fn log(&self) {
        let millis = self.duration.as_millis();
        if self.changed() > 0 || self.failed > 0 {
            info!(
                started_at = %self.started_at,
                records = self.records,
                created = self.created,
                deleted = self.deleted,
                respawned = self.respawned,
                deferred = self.deferred,
                skipped = self.skipped,
                failed = self.failed,
                reasons = ?self.reasons,
                duration_ms = millis,
                "Reconciliation cycle completed"
            );
        } else {
            debug!(
                started_at = %self.started_at,
                records = self.records,
                deferred = self.deferred,
                skipped = self.skipped,
                reasons = ?self.reasons,
                duration_ms = millis,
                "Reconciliation cycle completed, nothing to change"
            );
        }
    }
}

/// Drives reconciliation cycles on a fixed interval
pub struct Scheduler {
    store: Box<dyn ChargerStoreTrait>,
    reconciler: Reconciler,
    config: SchedulerConfig,
    metrics: Arc<Metrics>,
}

impl Scheduler {
    /// Creates a new scheduler instance.
    pub fn new(
        store: Box<dyn ChargerStoreTrait>,
        reconciler: Reconciler,
        config: SchedulerConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            reconciler,
            config,
            metrics,
        }
    }

    /// Run cycles until `shutdown` turns true (or its sender is dropped).
    ///
    /// The first cycle starts immediately. A cycle in progress when shutdown
    /// is signalled is abandoned; in-flight calls are dropped with it.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Reconciliation loop started (interval {}s)",
            self.config.interval.as_secs()
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => {
                    warn!("Shutdown requested during a reconciliation cycle, abandoning it");
                    break;
                }
                _ = self.run_cycle() => {}
            }
        }

        info!("Reconciliation loop stopped");
    }

    /// Run one reconciliation cycle.
    ///
    /// Never fails: a failed status read skips the cycle, and per-charger
    /// failures are counted in the report.
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::new(Utc::now());

        let records = match tokio::time::timeout(self.config.fetch_timeout, self.store.list_chargers()).await {
            Ok(Ok(records)) => Some(records),
            Ok(Err(e)) => {
                error!(error = %e, "Failed to read charger statuses, skipping cycle");
                None
            }
            Err(_) => {
                error!(
                    timeout_secs = self.config.fetch_timeout.as_secs(),
                    "Timed out reading charger statuses, skipping cycle"
                );
                None
            }
        };

        match records {
            Some(records) => {
                report.records = records.len();
                self.reconciler.prune(&records);

                let outcomes: Vec<ChargerOutcome> = stream::iter(records)
                    .map(|record| async move {
                        self.reconciler.reconcile_charger(&record, started).await
                    })
                    .buffer_unordered(self.config.max_concurrency)
                    .collect()
                    .await;

                for outcome in &outcomes {
                    report.record(outcome);
                }
                report.duration = started.elapsed();
                report.log();
            }
            None => {
                report.fetch_failed = true;
                report.duration = started.elapsed();
                warn!(started_at = %report.started_at, "Reconciliation cycle skipped");
            }
        }

        self.metrics.observe_cycle(&report);
        report
    }
}
