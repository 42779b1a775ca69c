//! Controller-specific error types.
//!
//! Only startup can fail the process: everything that goes wrong during a
//! reconciliation cycle is logged and retried on the next one.

use charger_store::StoreError;
use kube::Error as KubeError;
use thiserror::Error;
use workload_client::WorkloadError;

/// Errors that can occur in the Charger Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Status store error
    #[error("Status store error: {0}")]
    Store(StoreError),

    /// Workload client error
    #[error("Workload error: {0}")]
    Workload(#[from] WorkloadError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error (metrics listener)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Scheduler task panicked or was aborted
    #[error("Scheduler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<StoreError> for ControllerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::InvalidConfig(msg) => ControllerError::InvalidConfig(msg),
            other => ControllerError::Store(other),
        }
    }
}
