//! Keyed in-flight guard.
//!
//! At most one reconciliation may act on a given workload at a time. This
//! replaces a process-wide lock: unrelated chargers never wait on each other.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use workload_client::WorkloadRef;

/// Set of workloads currently being reconciled
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<WorkloadRef>>>,
}

impl InFlight {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a workload. Returns `None` if it is already claimed.
    ///
    /// The claim is released when the returned guard is dropped, including
    /// when the reconciliation future is cancelled.
    pub fn try_acquire(&self, name: &WorkloadRef) -> Option<InFlightGuard> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(name.clone()) {
            return None;
        }
        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            name: name.clone(),
        })
    }

    /// Number of workloads currently claimed
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Claim on one workload, released on drop
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<WorkloadRef>>>,
    name: WorkloadRef,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}
