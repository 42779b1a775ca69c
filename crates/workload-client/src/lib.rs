//! Charger Workload Client
//!
//! Narrow capability interface over the cluster orchestrator: every charger
//! runs as exactly one single-container pod named `charger-<id>`, and the
//! controller only ever needs to `get`, `create` and `delete` it.
//!
//! # Example
//!
//! ```no_run
//! use workload_client::{
//!     KubeWorkloadClient, PodTemplate, WorkloadClientTrait, WorkloadRef, WorkloadSpec, WorkloadState,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let kube_client = kube::Client::try_default().await?;
//! let client = KubeWorkloadClient::new(kube_client, "golang-app");
//!
//! let name = WorkloadRef::for_charger(1);
//! if client.get(&name).await? == WorkloadState::Absent {
//!     let spec = WorkloadSpec::for_charger(1, "Charger1", &PodTemplate::default());
//!     client.create(&spec).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod workload_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::KubeWorkloadClient;
pub use error::WorkloadError;
pub use models::*;
pub use workload_trait::WorkloadClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{MockWorkloadClient, WorkloadCall};
