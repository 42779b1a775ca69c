//! Workload client errors

use thiserror::Error;

/// Errors that can occur when operating on charger workloads
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// A workload with this name already exists
    #[error("Workload already exists: {0}")]
    AlreadyExists(String),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The call did not complete in time
    #[error("{operation} {name} timed out")]
    Timeout {
        operation: &'static str,
        name: String,
    },

    /// The orchestrator is unavailable
    #[error("Orchestrator unavailable: {0}")]
    Unavailable(String),
}
