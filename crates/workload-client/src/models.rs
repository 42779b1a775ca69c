//! Charger workload models

use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::fmt;

/// Label carrying the charger id on every workload
pub const CHARGER_ID_LABEL: &str = "charger-id";

/// Label marking workloads owned by the controller
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY: &str = "charger-controller";

/// Stable name of a charger's workload: `charger-<id>`.
///
/// This is the only correlation key between a charger record and its pod.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadRef(String);

impl WorkloadRef {
    /// Workload name for a charger id
    pub fn for_charger(charger_id: i64) -> Self {
        Self(format!("charger-{}", charger_id))
    }

    /// The workload name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WorkloadRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Observed state of a charger workload at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadState {
    /// The workload exists and has not finished (pending or running)
    Running,
    /// The workload exists but its container has exited (Succeeded or Failed)
    Terminated,
    /// The workload is being deleted
    Terminating,
    /// No workload with this name exists
    Absent,
}

impl WorkloadState {
    /// Derive the workload state from a pod object
    pub fn from_pod(pod: &Pod) -> Self {
        if pod.metadata.deletion_timestamp.is_some() {
            return WorkloadState::Terminating;
        }
        match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
            Some("Succeeded") | Some("Failed") => WorkloadState::Terminated,
            _ => WorkloadState::Running,
        }
    }
}

impl fmt::Display for WorkloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkloadState::Running => "Running",
            WorkloadState::Terminated => "Terminated",
            WorkloadState::Terminating => "Terminating",
            WorkloadState::Absent => "Absent",
        };
        f.write_str(s)
    }
}

/// Result of a delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The workload existed and deletion was accepted
    Deleted,
    /// There was nothing to delete
    NotFound,
}

/// Pod settings shared by every charger workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodTemplate {
    /// Container image
    pub image: String,
    /// Name of the single container
    pub container_name: String,
    /// Optional image pull policy (`Always`, `IfNotPresent`, `Never`)
    pub image_pull_policy: Option<String>,
    /// Extra labels applied to every pod
    pub labels: BTreeMap<String, String>,
}

impl Default for PodTemplate {
    fn default() -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "charger".to_string());
        Self {
            image: "charger-image:latest".to_string(),
            container_name: "charger".to_string(),
            image_pull_policy: None,
            labels,
        }
    }
}

/// Everything needed to create one charger workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    pub name: WorkloadRef,
    pub charger_id: i64,
    pub charger_name: String,
    pub image: String,
    pub container_name: String,
    pub image_pull_policy: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl WorkloadSpec {
    /// Build the workload spec for a charger from the shared template
    pub fn for_charger(charger_id: i64, charger_name: &str, template: &PodTemplate) -> Self {
        let mut labels = template.labels.clone();
        labels.insert(CHARGER_ID_LABEL.to_string(), charger_id.to_string());
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());

        Self {
            name: WorkloadRef::for_charger(charger_id),
            charger_id,
            charger_name: charger_name.to_string(),
            image: template.image.clone(),
            container_name: template.container_name.clone(),
            image_pull_policy: template.image_pull_policy.clone(),
            labels,
        }
    }

    /// Render the pod object for this workload
    pub fn to_pod(&self) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(self.name.to_string()),
                labels: Some(self.labels.clone()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: self.container_name.clone(),
                    image: Some(self.image.clone()),
                    image_pull_policy: self.image_pull_policy.clone(),
                    env: Some(vec![
                        EnvVar {
                            name: "CHARGER_ID".to_string(),
                            value: Some(self.charger_id.to_string()),
                            ..Default::default()
                        },
                        EnvVar {
                            name: "CHARGER_NAME".to_string(),
                            value: Some(self.charger_name.clone()),
                            ..Default::default()
                        },
                    ]),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn pod_with_phase(phase: Option<&str>) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: phase.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_workload_ref_naming() {
        assert_eq!(WorkloadRef::for_charger(1).as_str(), "charger-1");
        assert_eq!(WorkloadRef::for_charger(42).to_string(), "charger-42");
        assert_eq!(WorkloadRef::for_charger(7), WorkloadRef::for_charger(7));
    }

    #[test]
    fn test_state_from_pod_phase() {
        assert_eq!(WorkloadState::from_pod(&pod_with_phase(Some("Running"))), WorkloadState::Running);
        assert_eq!(WorkloadState::from_pod(&pod_with_phase(Some("Pending"))), WorkloadState::Running);
        assert_eq!(WorkloadState::from_pod(&pod_with_phase(None)), WorkloadState::Running);
        assert_eq!(WorkloadState::from_pod(&Pod::default()), WorkloadState::Running);
        assert_eq!(WorkloadState::from_pod(&pod_with_phase(Some("Failed"))), WorkloadState::Terminated);
        assert_eq!(WorkloadState::from_pod(&pod_with_phase(Some("Succeeded"))), WorkloadState::Terminated);
    }

    #[test]
    fn test_state_from_deleting_pod() {
        let mut pod = pod_with_phase(Some("Running"));
        pod.metadata.deletion_timestamp = Some(Time(Default::default()));
        assert_eq!(WorkloadState::from_pod(&pod), WorkloadState::Terminating);
    }

    #[test]
    fn test_spec_renders_pod() {
        let spec = WorkloadSpec::for_charger(3, "Charger3", &PodTemplate::default());
        let pod = spec.to_pod();

        assert_eq!(pod.metadata.name.as_deref(), Some("charger-3"));
        let labels = pod.metadata.labels.unwrap();
        assert_eq!(labels.get("app").map(String::as_str), Some("charger"));
        assert_eq!(labels.get(CHARGER_ID_LABEL).map(String::as_str), Some("3"));
        assert_eq!(labels.get(MANAGED_BY_LABEL).map(String::as_str), Some(MANAGED_BY));

        let pod_spec = pod.spec.unwrap();
        assert_eq!(pod_spec.containers.len(), 1);
        let container = &pod_spec.containers[0];
        assert_eq!(container.name, "charger");
        assert_eq!(container.image.as_deref(), Some("charger-image:latest"));
        assert_eq!(container.image_pull_policy, None);

        let env = container.env.as_ref().unwrap();
        assert_eq!(env[0].name, "CHARGER_ID");
        assert_eq!(env[0].value.as_deref(), Some("3"));
        assert_eq!(env[1].name, "CHARGER_NAME");
        assert_eq!(env[1].value.as_deref(), Some("Charger3"));
    }

    #[test]
    fn test_spec_uses_template_overrides() {
        let template = PodTemplate {
            image: "registry.local/charger:1.2".to_string(),
            image_pull_policy: Some("Always".to_string()),
            ..Default::default()
        };
        let pod = WorkloadSpec::for_charger(9, "X", &template).to_pod();
        let container = &pod.spec.unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("registry.local/charger:1.2"));
        assert_eq!(container.image_pull_policy.as_deref(), Some("Always"));
    }
}
