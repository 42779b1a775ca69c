//! Charger Controller
//!
//! Keeps one pod per charger in step with the status recorded for it in the
//! charger status store:
//! - active: the charger pod must be running
//! - error: the charger pod is deleted and created again
//! - disabled: the charger pod must not exist
//! - inactive: left alone
//!
//! The controller polls the store on a fixed interval and never writes to it.

mod backoff;
mod config;
mod controller;
mod error;
mod inflight;
mod metrics;
mod reconciler;
mod scheduler;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::error::ControllerError;
use rustls::crypto::CryptoProvider;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    init_tracing();

    info!("Starting Charger Controller");

    // kube's rustls client needs a process-wide crypto provider
    if CryptoProvider::install_default(rustls::crypto::ring::default_provider()).is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    let config = ControllerConfig::from_env()?;
    config.log_summary();

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}

/// `RUST_LOG` filters (default `info`); `LOG_FORMAT=json` selects JSON output
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
