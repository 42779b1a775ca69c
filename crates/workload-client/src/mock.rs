//! Mock WorkloadClient for unit testing
//!
//! Stores workload states in memory, records every call in order and can be
//! configured to fail or stall specific operations, so reconciler tests can
//! assert on exactly which cluster calls were made.

use crate::error::WorkloadError;
use crate::models::{DeleteOutcome, WorkloadRef, WorkloadSpec, WorkloadState};
use crate::workload_trait::WorkloadClientTrait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A call made against the mock, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadCall {
    Get(String),
    Create(String),
    Delete(String),
}

impl WorkloadCall {
    /// Workload name the call was made for
    pub fn name(&self) -> &str {
        match self {
            WorkloadCall::Get(name) | WorkloadCall::Create(name) | WorkloadCall::Delete(name) => name,
        }
    }

    /// Whether the call mutates the cluster
    pub fn is_mutation(&self) -> bool {
        !matches!(self, WorkloadCall::Get(_))
    }
}

#[derive(Default)]
pub(crate) struct MockState {
    workloads: HashMap<String, WorkloadState>,
    specs: HashMap<String, WorkloadSpec>,
    calls: Vec<WorkloadCall>,
    failing_gets: HashSet<String>,
    failing_creates: HashSet<String>,
    failing_deletes: HashSet<String>,
    slow_terminations: HashSet<String>,
    delay: Option<Duration>,
}

/// Mock WorkloadClient for testing
#[derive(Clone)]
pub struct MockWorkloadClient {
    namespace: String,
    pub(crate) state: Arc<Mutex<MockState>>,
}

impl Default for MockWorkloadClient {
    fn default() -> Self {
        Self::new("golang-app")
    }
}

impl MockWorkloadClient {
    /// Create a mock with an empty cluster
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Set the observed state of a workload (for test setup).
    ///
    /// `WorkloadState::Absent` removes the workload.
    pub fn set_state(&self, name: impl AsRef<str>, state: WorkloadState) {
        let mut inner = self.state.lock().unwrap();
        if state == WorkloadState::Absent {
            inner.workloads.remove(name.as_ref());
        } else {
            inner.workloads.insert(name.as_ref().to_string(), state);
        }
    }

    /// Current state of a workload
    pub fn state(&self, name: impl AsRef<str>) -> WorkloadState {
        self.state
            .lock()
            .unwrap()
            .workloads
            .get(name.as_ref())
            .copied()
            .unwrap_or(WorkloadState::Absent)
    }

    /// Spec of the last successful create for a workload
    pub fn spec(&self, name: impl AsRef<str>) -> Option<WorkloadSpec> {
        self.state.lock().unwrap().specs.get(name.as_ref()).cloned()
    }

    /// Make `get` fail for a workload
    pub fn fail_get(&self, name: impl AsRef<str>) {
        self.state.lock().unwrap().failing_gets.insert(name.as_ref().to_string());
    }

    /// Make `create` fail for a workload
    pub fn fail_create(&self, name: impl AsRef<str>) {
        self.state.lock().unwrap().failing_creates.insert(name.as_ref().to_string());
    }

    /// Make `delete` fail for a workload
    pub fn fail_delete(&self, name: impl AsRef<str>) {
        self.state.lock().unwrap().failing_deletes.insert(name.as_ref().to_string());
    }

    /// Make `delete` leave a workload `Terminating` instead of removing it,
    /// like a pod still inside its grace period
    pub fn delay_termination(&self, name: impl AsRef<str>) {
        self.state
            .lock()
            .unwrap()
            .slow_terminations
            .insert(name.as_ref().to_string());
    }

    /// Remove all configured failures
    pub fn clear_failures(&self) {
        let mut inner = self.state.lock().unwrap();
        inner.failing_gets.clear();
        inner.failing_creates.clear();
        inner.failing_deletes.clear();
    }

    /// Delay every call by `delay` (used to exercise timeouts and cancellation)
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().delay = delay;
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<WorkloadCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Create and delete calls made so far, in order
    pub fn mutation_calls(&self) -> Vec<WorkloadCall> {
        self.calls().into_iter().filter(WorkloadCall::is_mutation).collect()
    }

    /// Calls made for one workload, in order
    pub fn calls_for(&self, name: impl AsRef<str>) -> Vec<WorkloadCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.name() == name.as_ref())
            .collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Record a call and return the configured delay
    fn record(&self, call: WorkloadCall) -> Option<Duration> {
        let mut inner = self.state.lock().unwrap();
        inner.calls.push(call);
        inner.delay
    }
}

#[async_trait::async_trait]
impl WorkloadClientTrait for MockWorkloadClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get(&self, name: &WorkloadRef) -> Result<WorkloadState, WorkloadError> {
        if let Some(delay) = self.record(WorkloadCall::Get(name.to_string())) {
            tokio::time::sleep(delay).await;
        }

        let inner = self.state.lock().unwrap();
        if inner.failing_gets.contains(name.as_str()) {
            return Err(WorkloadError::Unavailable(format!("mock get {} failed", name)));
        }
        Ok(inner
            .workloads
            .get(name.as_str())
            .copied()
            .unwrap_or(WorkloadState::Absent))
    }

    async fn create(&self, spec: &WorkloadSpec) -> Result<(), WorkloadError> {
        if let Some(delay) = self.record(WorkloadCall::Create(spec.name.to_string())) {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.state.lock().unwrap();
        let name = spec.name.to_string();
        if inner.failing_creates.contains(&name) {
            return Err(WorkloadError::Unavailable(format!("mock create {} failed", name)));
        }
        if inner.workloads.contains_key(&name) {
            return Err(WorkloadError::AlreadyExists(name));
        }
        inner.workloads.insert(name.clone(), WorkloadState::Running);
        inner.specs.insert(name, spec.clone());
        Ok(())
    }

    async fn delete(&self, name: &WorkloadRef) -> Result<DeleteOutcome, WorkloadError> {
        if let Some(delay) = self.record(WorkloadCall::Delete(name.to_string())) {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.state.lock().unwrap();
        if inner.failing_deletes.contains(name.as_str()) {
            return Err(WorkloadError::Unavailable(format!("mock delete {} failed", name)));
        }
        if inner.slow_terminations.contains(name.as_str()) {
            if let Some(state) = inner.workloads.get_mut(name.as_str()) {
                *state = WorkloadState::Terminating;
                return Ok(DeleteOutcome::Deleted);
            }
        }
        match inner.workloads.remove(name.as_str()) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }
}
