//! Test utilities for unit testing the reconciler and scheduler
//!
//! This module provides helpers for creating test data and wiring the
//! controller against the in-memory store and workload client.

use crate::backoff::BackoffTracker;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::scheduler::{Scheduler, SchedulerConfig};
use charger_store::{ChargerRecord, MockChargerStore};
use std::sync::Arc;
use std::time::Duration;
use workload_client::{MockWorkloadClient, PodTemplate, WorkloadRef};

pub const CALL_TIMEOUT: Duration = Duration::from_secs(10);
pub const INTERVAL: Duration = Duration::from_secs(30);

/// Helper to create a charger record
pub fn charger(id: i64, status: &str) -> ChargerRecord {
    ChargerRecord::new(id, format!("Charger{}", id), status)
}

/// Workload name of a charger
pub fn pod(id: i64) -> WorkloadRef {
    WorkloadRef::for_charger(id)
}

/// Helper to create a reconciler backed by `client`.
///
/// Minimum backoff equals the test interval, so a failed charger is retried
/// on the next cycle.
pub fn create_test_reconciler(client: &MockWorkloadClient) -> Reconciler {
    Reconciler::new(
        Box::new(client.clone()),
        PodTemplate::default(),
        CALL_TIMEOUT,
        BackoffTracker::new(INTERVAL, Duration::from_secs(300)),
    )
}

/// Scheduler settings used by tests
pub fn test_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        interval: INTERVAL,
        fetch_timeout: Duration::from_secs(15),
        max_concurrency: 4,
    }
}

/// Helper to create a scheduler over the mocks, returning its metrics
pub fn create_test_scheduler(
    store: &MockChargerStore,
    client: &MockWorkloadClient,
    config: SchedulerConfig,
) -> (Scheduler, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new().unwrap());
    let scheduler = Scheduler::new(
        Box::new(store.clone()),
        create_test_reconciler(client),
        config,
        Arc::clone(&metrics),
    );
    (scheduler, metrics)
}
