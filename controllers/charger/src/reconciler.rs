//! Reconciliation logic for charger workloads.
//!
//! Maps one charger record to at most one cluster mutation (a respawn is a
//! delete followed by a create). Decisions are level-based: they depend only
//! on the declared status and the workload state observed right now, never on
//! what happened in earlier cycles.
//!
//! | Declared   | Observed                  | Action              |
//! |------------|---------------------------|---------------------|
//! | active     | Absent                    | create              |
//! | active     | Running                   | none                |
//! | active     | Terminated                | delete, then create |
//! | active     | Terminating / unknown     | retry next cycle    |
//! | error      | any (not observed)        | delete, then create |
//! | disabled   | Running / Terminated      | delete              |
//! | disabled   | Absent / Terminating      | none                |
//! | disabled   | unknown                   | retry next cycle    |
//! | inactive   | any (not observed)        | none                |
//! | unknown    | any (not observed)        | none, warning       |

use crate::backoff::BackoffTracker;
use crate::inflight::InFlight;
use charger_store::{ChargerRecord, DeclaredStatus};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use workload_client::{
    DeleteOutcome, PodTemplate, WorkloadClientTrait, WorkloadError, WorkloadRef, WorkloadSpec,
    WorkloadState,
};

/// What the state machine wants done for one charger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Already converged
    Noop,
    /// Create the workload
    Create,
    /// Delete the workload
    Delete,
    /// Delete the workload (if present) and create it again
    Respawn,
    /// State cannot be acted on safely right now, retry next cycle
    Defer,
}

/// Whether the decision for a status depends on the observed workload state
pub fn requires_observation(status: DeclaredStatus) -> bool {
    matches!(status, DeclaredStatus::Active | DeclaredStatus::Disabled)
}

/// Decide the action for a declared status and an observed state.
///
/// `observed` is `None` when the state is unknown (the `get` failed) or was
/// not needed (see [`requires_observation`]).
pub fn decide(status: DeclaredStatus, observed: Option<WorkloadState>) -> Decision {
    match (status, observed) {
        (DeclaredStatus::Inactive, _) => Decision::Noop,
        (DeclaredStatus::Error, _) => Decision::Respawn,

        (DeclaredStatus::Active, Some(WorkloadState::Absent)) => Decision::Create,
        (DeclaredStatus::Active, Some(WorkloadState::Running)) => Decision::Noop,
        (DeclaredStatus::Active, Some(WorkloadState::Terminated)) => Decision::Respawn,
        (DeclaredStatus::Active, Some(WorkloadState::Terminating)) => Decision::Defer,
        (DeclaredStatus::Active, None) => Decision::Defer,

        (DeclaredStatus::Disabled, Some(WorkloadState::Running | WorkloadState::Terminated)) => {
            Decision::Delete
        }
        (DeclaredStatus::Disabled, Some(WorkloadState::Absent | WorkloadState::Terminating)) => {
            Decision::Noop
        }
        (DeclaredStatus::Disabled, None) => Decision::Defer,
    }
}

/// Cluster mutation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadAction {
    Create,
    Delete,
}

impl fmt::Display for WorkloadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadAction::Create => f.write_str("create"),
            WorkloadAction::Delete => f.write_str("delete"),
        }
    }
}

/// A cluster mutation failed for one charger
#[derive(Debug, Error)]
#[error("{action} failed for charger {charger_name} (id {charger_id}): {cause}")]
pub struct ActionFailed {
    pub charger_id: i64,
    pub charger_name: String,
    pub action: WorkloadAction,
    #[source]
    pub cause: WorkloadError,
}

/// Why a charger was left for the next cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// The workload state could not be observed
    ObservationFailed,
    /// The workload is still shutting down
    Terminating,
}

impl DeferReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeferReason::ObservationFailed => "observation_failed",
            DeferReason::Terminating => "terminating",
        }
    }
}

/// Why a charger was not reconciled at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The declared status is not recognised
    UnknownStatus,
    /// Another reconciliation is acting on the same workload
    InFlight,
    /// Recent actions failed under the same status, waiting for the backoff
    BackingOff,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UnknownStatus => "unknown_status",
            SkipReason::InFlight => "in_flight",
            SkipReason::BackingOff => "backing_off",
        }
    }
}

/// Result of reconciling one charger
#[derive(Debug)]
pub enum ChargerOutcome {
    Unchanged,
    Created,
    Deleted,
    Respawned,
    Deferred(DeferReason),
    Skipped(SkipReason),
    Failed(ActionFailed),
}

/// Reconciles charger records against their workloads.
pub struct Reconciler {
    client: Box<dyn WorkloadClientTrait>,
    template: PodTemplate,
    call_timeout: Duration,
    in_flight: InFlight,
    backoff: BackoffTracker,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        client: Box<dyn WorkloadClientTrait>,
        template: PodTemplate,
        call_timeout: Duration,
        backoff: BackoffTracker,
    ) -> Self {
        Self {
            client,
            template,
            call_timeout,
            in_flight: InFlight::new(),
            backoff,
        }
    }

    /// Drop failure history of chargers that are no longer listed
    pub fn prune(&self, records: &[ChargerRecord]) {
        let ids: HashSet<i64> = records.iter().map(|r| r.id).collect();
        self.backoff.retain(&ids);
    }

    /// Reconciles one charger record.
    ///
    /// Never returns an error: failures are reported in the outcome and only
    /// affect this charger. `cycle_start` is the start of the current cycle,
    /// used for failure backoff.
    pub async fn reconcile_charger(&self, record: &ChargerRecord, cycle_start: Instant) -> ChargerOutcome {
        let status = match record.declared_status() {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    charger_id = record.id,
                    charger = %record.name,
                    status = %record.status,
                    "Unknown status for charger, leaving workload untouched: {}", e
                );
                return ChargerOutcome::Skipped(SkipReason::UnknownStatus);
            }
        };

        if status == DeclaredStatus::Inactive {
            debug!(charger_id = record.id, charger = %record.name, "Charger inactive, nothing to do");
            return ChargerOutcome::Unchanged;
        }

        let name = WorkloadRef::for_charger(record.id);

        let _claim = match self.in_flight.try_acquire(&name) {
            Some(claim) => claim,
            None => {
                warn!(
                    charger_id = record.id,
                    workload = %name,
                    "Workload is already being reconciled, skipping duplicate record"
                );
                return ChargerOutcome::Skipped(SkipReason::InFlight);
            }
        };

        if let Some(remaining) = self.backoff.remaining(record.id, status, cycle_start) {
            debug!(
                charger_id = record.id,
                workload = %name,
                status = %status,
                retry_in_secs = remaining.as_secs(),
                "Charger is backing off after failures"
            );
            return ChargerOutcome::Skipped(SkipReason::BackingOff);
        }

        let observed = if requires_observation(status) {
            match self.timed("get", &name, self.client.get(&name)).await {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(
                        charger_id = record.id,
                        workload = %name,
                        error = %e,
                        "Could not observe workload, retrying next cycle"
                    );
                    None
                }
            }
        } else {
            None
        };

        let decision = decide(status, observed);
        debug!(
            charger_id = record.id,
            workload = %name,
            status = %status,
            observed = ?observed,
            decision = ?decision,
            "Reconciling charger"
        );

        let outcome = match decision {
            Decision::Noop => ChargerOutcome::Unchanged,
            Decision::Defer => {
                if observed == Some(WorkloadState::Terminating) {
                    info!(charger_id = record.id, workload = %name, "Workload still terminating, retrying next cycle");
                    ChargerOutcome::Deferred(DeferReason::Terminating)
                } else {
                    ChargerOutcome::Deferred(DeferReason::ObservationFailed)
                }
            }
            Decision::Create => self.create(record, &name).await,
            Decision::Delete => self.delete(record, &name).await,
            Decision::Respawn => self.respawn(record, &name).await,
        };

        match &outcome {
            ChargerOutcome::Failed(failure) => {
                let (backoff, error_count) = self.backoff.record_failure(record.id, status, cycle_start);
                error!(
                    charger_id = record.id,
                    workload = %name,
                    action = %failure.action,
                    error_count,
                    retry_in_secs = backoff.as_secs(),
                    "{}", failure
                );
            }
            ChargerOutcome::Deferred(_) => {}
            _ => self.backoff.record_success(record.id),
        }

        outcome
    }

    async fn create(&self, record: &ChargerRecord, name: &WorkloadRef) -> ChargerOutcome {
        info!(
            charger_id = record.id,
            charger = %record.name,
            namespace = self.client.namespace(),
            workload = %name,
            "Creating workload for active charger"
        );

        let spec = WorkloadSpec::for_charger(record.id, &record.name, &self.template);
        match self.timed("create", name, self.client.create(&spec)).await {
            Ok(()) => {
                info!(charger_id = record.id, workload = %name, "Created workload");
                ChargerOutcome::Created
            }
            Err(WorkloadError::AlreadyExists(_)) => {
                info!(charger_id = record.id, workload = %name, "Workload already exists, created concurrently");
                ChargerOutcome::Unchanged
            }
            Err(cause) => failed(record, WorkloadAction::Create, cause),
        }
    }

    async fn delete(&self, record: &ChargerRecord, name: &WorkloadRef) -> ChargerOutcome {
        info!(
            charger_id = record.id,
            charger = %record.name,
            namespace = self.client.namespace(),
            workload = %name,
            "Deleting workload for disabled charger"
        );

        match self.timed("delete", name, self.client.delete(name)).await {
            Ok(DeleteOutcome::Deleted) => {
                info!(charger_id = record.id, workload = %name, "Deleted workload");
                ChargerOutcome::Deleted
            }
            Ok(DeleteOutcome::NotFound) => {
                debug!(charger_id = record.id, workload = %name, "Workload already gone");
                ChargerOutcome::Unchanged
            }
            Err(cause) => failed(record, WorkloadAction::Delete, cause),
        }
    }

    async fn respawn(&self, record: &ChargerRecord, name: &WorkloadRef) -> ChargerOutcome {
        info!(
            charger_id = record.id,
            charger = %record.name,
            namespace = self.client.namespace(),
            workload = %name,
            "Respawning workload"
        );

        match self.timed("delete", name, self.client.delete(name)).await {
            Ok(DeleteOutcome::Deleted) => {
                debug!(charger_id = record.id, workload = %name, "Deleted stale workload");
            }
            Ok(DeleteOutcome::NotFound) => {
                debug!(charger_id = record.id, workload = %name, "No stale workload to delete");
            }
            // The stale workload may still be running; creating now would conflict
            Err(cause) => return failed(record, WorkloadAction::Delete, cause),
        }

        let spec = WorkloadSpec::for_charger(record.id, &record.name, &self.template);
        match self.timed("create", name, self.client.create(&spec)).await {
            Ok(()) => {
                info!(charger_id = record.id, workload = %name, "Respawned workload");
                ChargerOutcome::Respawned
            }
            Err(WorkloadError::AlreadyExists(_)) => {
                info!(
                    charger_id = record.id,
                    workload = %name,
                    "Previous workload still terminating, respawn continues next cycle"
                );
                ChargerOutcome::Deferred(DeferReason::Terminating)
            }
            Err(cause) => failed(record, WorkloadAction::Create, cause),
        }
    }

    /// Bound a workload call by the per-call timeout
    async fn timed<T, F>(&self, operation: &'static str, name: &WorkloadRef, call: F) -> Result<T, WorkloadError>
    where
        F: Future<Output = Result<T, WorkloadError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(WorkloadError::Timeout {
                operation,
                name: name.to_string(),
            }),
        }
    }
}

fn failed(record: &ChargerRecord, action: WorkloadAction, cause: WorkloadError) -> ChargerOutcome {
    ChargerOutcome::Failed(ActionFailed {
        charger_id: record.id,
        charger_name: record.name.clone(),
        action,
        cause,
    })
}
