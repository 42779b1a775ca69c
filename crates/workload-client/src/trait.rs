//! WorkloadClient trait for mocking
//!
//! The reconciler depends only on this trait. `KubeWorkloadClient` implements
//! it against the Kubernetes API, tests use `MockWorkloadClient`.

use crate::error::WorkloadError;
use crate::models::{DeleteOutcome, WorkloadRef, WorkloadSpec, WorkloadState};

/// Trait for charger workload operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait WorkloadClientTrait: Send + Sync {
    /// Namespace the workloads live in
    fn namespace(&self) -> &str;

    /// Observe the current state of a workload.
    ///
    /// A missing workload is `Ok(WorkloadState::Absent)`, never an error.
    async fn get(&self, name: &WorkloadRef) -> Result<WorkloadState, WorkloadError>;

    /// Create a workload.
    ///
    /// Fails with `WorkloadError::AlreadyExists` if the name is taken.
    async fn create(&self, spec: &WorkloadSpec) -> Result<(), WorkloadError>;

    /// Delete a workload.
    ///
    /// Deleting a missing workload returns `Ok(DeleteOutcome::NotFound)`.
    async fn delete(&self, name: &WorkloadRef) -> Result<DeleteOutcome, WorkloadError>;
}
