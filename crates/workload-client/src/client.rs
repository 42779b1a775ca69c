//! Kubernetes workload client
//!
//! Implements the workload operations against core/v1 pods in one namespace.

use crate::error::WorkloadError;
use crate::models::{DeleteOutcome, WorkloadRef, WorkloadSpec, WorkloadState};
use crate::workload_trait::WorkloadClientTrait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use tracing::debug;

/// Charger workload client backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeWorkloadClient {
    client: Client,
    pods: Api<Pod>,
    namespace: String,
    delete_grace_period: Option<u32>,
}

impl KubeWorkloadClient {
    /// Create a new workload client
    ///
    /// # Arguments
    /// * `client` - Kubernetes client (in-cluster identity or local kubeconfig)
    /// * `namespace` - Namespace the charger pods live in
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let pods = Api::namespaced(client.clone(), &namespace);
        Self {
            client,
            pods,
            namespace,
            delete_grace_period: None,
        }
    }

    /// Override the grace period used when deleting pods
    pub fn with_delete_grace_period(mut self, seconds: Option<u32>) -> Self {
        self.delete_grace_period = seconds;
        self
    }

    /// Verify that the API server is reachable with the current identity.
    ///
    /// Called once at startup; a controller that cannot reach the cluster
    /// must not start.
    pub async fn verify_connectivity(&self) -> Result<String, WorkloadError> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }
}

/// HTTP status code of an API error response, if any
fn api_error_code(error: &kube::Error) -> Option<u16> {
    match error {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}

#[async_trait::async_trait]
impl WorkloadClientTrait for KubeWorkloadClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get(&self, name: &WorkloadRef) -> Result<WorkloadState, WorkloadError> {
        debug!(namespace = %self.namespace, workload = %name, "GET pod");

        match self.pods.get_opt(name.as_str()).await? {
            Some(pod) => Ok(WorkloadState::from_pod(&pod)),
            None => Ok(WorkloadState::Absent),
        }
    }

    async fn create(&self, spec: &WorkloadSpec) -> Result<(), WorkloadError> {
        debug!(namespace = %self.namespace, workload = %spec.name, "CREATE pod");

        match self.pods.create(&PostParams::default(), &spec.to_pod()).await {
            Ok(_) => Ok(()),
            Err(e) if api_error_code(&e) == Some(409) => {
                Err(WorkloadError::AlreadyExists(spec.name.to_string()))
            }
            Err(e) => Err(WorkloadError::Kube(e)),
        }
    }

    async fn delete(&self, name: &WorkloadRef) -> Result<DeleteOutcome, WorkloadError> {
        debug!(namespace = %self.namespace, workload = %name, "DELETE pod");

        let params = DeleteParams {
            grace_period_seconds: self.delete_grace_period,
            ..Default::default()
        };

        match self.pods.delete(name.as_str(), &params).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(e) if api_error_code(&e) == Some(404) => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(WorkloadError::Kube(e)),
        }
    }
}
