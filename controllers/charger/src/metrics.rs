//! Prometheus metrics and health endpoints.
//!
//! The registry is always populated; the HTTP server that exposes it is only
//! started when a listen address is configured.

use crate::error::ControllerError;
use crate::scheduler::CycleReport;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{
    Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Controller metrics
#[derive(Debug)]
pub struct Metrics {
    registry: Registry,
    cycles: IntCounterVec,
    outcomes: IntCounterVec,
    held: IntCounterVec,
    cycle_duration: Histogram,
    records: IntGauge,
    ready: AtomicBool,
}

impl Metrics {
    /// Create and register all collectors
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles = IntCounterVec::new(
            Opts::new("charger_reconcile_cycles_total", "Reconciliation cycles run"),
            &["result"],
        )?;
        let outcomes = IntCounterVec::new(
            Opts::new(
                "charger_reconcile_outcomes_total",
                "Per-charger reconciliation outcomes",
            ),
            &["outcome"],
        )?;
        let held = IntCounterVec::new(
            Opts::new(
                "charger_reconcile_held_total",
                "Deferred and skipped chargers by reason",
            ),
            &["reason"],
        )?;
        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "charger_reconcile_cycle_duration_seconds",
                "Duration of reconciliation cycles",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        let records = IntGauge::new(
            "charger_records_observed",
            "Charger records returned by the last successful status read",
        )?;

        registry.register(Box::new(cycles.clone()))?;
        registry.register(Box::new(outcomes.clone()))?;
        registry.register(Box::new(held.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(records.clone()))?;

        Ok(Self {
            registry,
            cycles,
            outcomes,
            held,
            cycle_duration,
            records,
            ready: AtomicBool::new(false),
        })
    }

    /// Record a completed cycle. The first one marks the controller ready.
    pub fn observe_cycle(&self, report: &CycleReport) {
        self.cycle_duration.observe(report.duration.as_secs_f64());
        self.ready.store(true, Ordering::Relaxed);

        if report.fetch_failed {
            self.cycles.with_label_values(&["fetch_failed"]).inc();
            return;
        }
        self.cycles.with_label_values(&["ok"]).inc();
        self.records
            .set(i64::try_from(report.records).unwrap_or(i64::MAX));

        for (outcome, count) in [
            ("created", report.created),
            ("deleted", report.deleted),
            ("respawned", report.respawned),
            ("unchanged", report.unchanged),
            ("deferred", report.deferred),
            ("skipped", report.skipped),
            ("failed", report.failed),
        ] {
            if count > 0 {
                self.outcomes
                    .with_label_values(&[outcome])
                    .inc_by(count as u64);
            }
        }
        for (reason, count) in &report.reasons {
            self.held.with_label_values(&[*reason]).inc_by(*count as u64);
        }
    }

    /// Whether at least one cycle has completed
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, ControllerError> {
        let encoder = TextEncoder::new();
        Ok(encoder.encode_to_string(&self.registry.gather())?)
    }
}

/// Router serving `/metrics`, `/healthz` and `/readyz`
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve the metrics router until shutdown is signalled
pub async fn serve(
    addr: SocketAddr,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics server listening on http://{}", addr);

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    info!("Metrics server stopped");
    Ok(())
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(metrics): State<Arc<Metrics>>) -> Response {
    if metrics.is_ready() {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "waiting for first cycle").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn report() -> CycleReport {
        let mut report = CycleReport::new(Utc::now());
        report.records = 3;
        report.created = 2;
        report.failed = 1;
        report.duration = Duration::from_millis(120);
        report
    }

    #[test]
    fn test_observe_cycle_updates_collectors() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.is_ready());

        metrics.observe_cycle(&report());
        assert!(metrics.is_ready());

        let text = metrics.encode().unwrap();
        assert!(text.contains("charger_reconcile_cycles_total{result=\"ok\"} 1"));
        assert!(text.contains("charger_reconcile_outcomes_total{outcome=\"created\"} 2"));
        assert!(text.contains("charger_reconcile_outcomes_total{outcome=\"failed\"} 1"));
        assert!(text.contains("charger_records_observed 3"));
        assert!(text.contains("charger_reconcile_cycle_duration_seconds_count 1"));
    }

    #[test]
    fn test_held_chargers_counted_by_reason() {
        let metrics = Metrics::new().unwrap();
        let mut held = report();
        held.skipped = 2;
        held.deferred = 1;
        held.reasons.insert("unknown_status", 2);
        held.reasons.insert("terminating", 1);

        metrics.observe_cycle(&held);
        metrics.observe_cycle(&held);

        let text = metrics.encode().unwrap();
        assert!(text.contains("charger_reconcile_held_total{reason=\"unknown_status\"} 4"));
        assert!(text.contains("charger_reconcile_held_total{reason=\"terminating\"} 2"));
        assert!(!text.contains("reason=\"in_flight\""));
    }

    #[test]
    fn test_fetch_failure_keeps_last_record_count() {
        let metrics = Metrics::new().unwrap();
        metrics.observe_cycle(&report());

        let mut failed = CycleReport::new(Utc::now());
        failed.fetch_failed = true;
        metrics.observe_cycle(&failed);

        let text = metrics.encode().unwrap();
        assert!(text.contains("charger_reconcile_cycles_total{result=\"fetch_failed\"} 1"));
        assert!(text.contains("charger_records_observed 3"));
    }

    #[tokio::test]
    async fn test_readyz_waits_for_first_cycle() {
        let metrics = Arc::new(Metrics::new().unwrap());

        let response = readyz(State(Arc::clone(&metrics))).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        metrics.observe_cycle(&report());
        let response = readyz(State(metrics)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
