//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the status store,
//! the workload client and the reconciliation loop together, and owns the
//! process lifecycle (startup checks, shutdown signals).

use crate::backoff::BackoffTracker;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::scheduler::{Scheduler, SchedulerConfig};
use charger_store::{ChargerStoreTrait, PgChargerStore};
use kube::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use workload_client::KubeWorkloadClient;

/// Main controller for charger workloads.
pub struct Controller {
    scheduler: Scheduler,
    metrics: Arc<Metrics>,
    metrics_addr: Option<SocketAddr>,
}

impl Controller {
    /// Creates a new controller instance.
    ///
    /// Fails if the configuration is malformed or the cluster API is
    /// unreachable. An unreachable status store is only logged: the loop keeps
    /// retrying it every cycle.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Charger Controller");

        // Pool connects lazily; only a malformed URL fails here
        let store = PgChargerStore::new(&config.store)?;

        let kube_client = Client::try_default().await?;
        let workload_client = KubeWorkloadClient::new(kube_client, config.namespace.clone())
            .with_delete_grace_period(config.delete_grace_period);

        info!("Verifying Kubernetes API connectivity...");
        let version = workload_client.verify_connectivity().await.map_err(|e| {
            error!("Failed to reach the Kubernetes API: {}", e);
            error!("Please ensure the controller runs in-cluster or a kubeconfig is available");
            ControllerError::Workload(e)
        })?;
        info!("Connected to Kubernetes {}", version);

        match store.health_check().await {
            Ok(()) => info!("Status store is reachable"),
            Err(e) => warn!("Status store is not reachable yet (will retry every cycle): {}", e),
        }

        let metrics = Arc::new(Metrics::new()?);

        let reconciler = Reconciler::new(
            Box::new(workload_client),
            config.template.clone(),
            config.call_timeout,
            BackoffTracker::new(config.backoff_min, config.backoff_max),
        );

        let scheduler = Scheduler::new(
            Box::new(store),
            reconciler,
            SchedulerConfig {
                interval: config.interval,
                fetch_timeout: config.fetch_timeout,
                max_concurrency: config.max_concurrency,
            },
            Arc::clone(&metrics),
        );

        Ok(Self {
            scheduler,
            metrics,
            metrics_addr: config.metrics_addr,
        })
    }

    /// Runs the controller until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Charger Controller running");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let metrics_server = self.metrics_addr.map(|addr| {
            let metrics = Arc::clone(&self.metrics);
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) = metrics::serve(addr, metrics, shutdown_rx).await {
                    error!("Metrics server error: {}", e);
                }
            })
        });

        let scheduler = self.scheduler;
        let scheduler_handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

        shutdown_signal().await;
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);

        scheduler_handle.await?;

        if let Some(handle) = metrics_server {
            handle.await?;
        }

        info!("Charger Controller shutdown complete");
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
