//! Controller configuration.
//!
//! All settings come from environment variables. Only `DATABASE_URL` is
//! required; everything else has a default. Malformed values are rejected
//! rather than silently replaced by defaults.

use crate::error::ControllerError;
use charger_store::StoreConfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use workload_client::PodTemplate;

/// Namespace the charger pods are created in
pub const DEFAULT_NAMESPACE: &str = "golang-app";

/// Full controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Status store connection settings
    pub store: StoreConfig,
    /// Namespace of the charger workloads
    pub namespace: String,
    /// Pod settings shared by every charger workload
    pub template: PodTemplate,
    /// Time between cycle starts
    pub interval: Duration,
    /// Timeout of a single get/create/delete call
    pub call_timeout: Duration,
    /// Timeout of the bulk status read
    pub fetch_timeout: Duration,
    /// Maximum number of chargers reconciled concurrently
    pub max_concurrency: usize,
    /// Failure backoff bounds
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    /// Grace period for pod deletion, cluster default when unset
    pub delete_grace_period: Option<u32>,
    /// Address of the metrics and health endpoints, disabled when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl ControllerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or_else(|| {
            ControllerError::InvalidConfig(
                "DATABASE_URL environment variable is required".to_string(),
            )
        })?;

        let mut store = StoreConfig::new(database_url);
        if let Some(table) = var("CHARGER_TABLE") {
            store.table = table;
        }
        store.max_connections = parse_or(&var, "DB_MAX_CONNECTIONS", store.max_connections)?;
        store.min_connections = parse_or(&var, "DB_MIN_CONNECTIONS", store.min_connections)?;
        if store.min_connections > store.max_connections {
            return Err(ControllerError::InvalidConfig(format!(
                "DB_MIN_CONNECTIONS ({}) exceeds DB_MAX_CONNECTIONS ({})",
                store.min_connections, store.max_connections
            )));
        }

        let mut template = PodTemplate::default();
        if let Some(image) = var("CHARGER_IMAGE") {
            template.image = image;
        }
        template.image_pull_policy = var("CHARGER_IMAGE_PULL_POLICY");

        let backoff_min = positive_secs(&var, "BACKOFF_MIN_SECS", 30)?;
        let backoff_max = positive_secs(&var, "BACKOFF_MAX_SECS", 300)?;
        if backoff_min > backoff_max {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MIN_SECS ({}) exceeds BACKOFF_MAX_SECS ({})",
                backoff_min.as_secs(),
                backoff_max.as_secs()
            )));
        }

        let max_concurrency: usize = parse_or(&var, "MAX_CONCURRENT_RECONCILES", 8)?;
        if max_concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "MAX_CONCURRENT_RECONCILES must be greater than 0".to_string(),
            ));
        }

        let delete_grace_period = match var("DELETE_GRACE_PERIOD_SECS") {
            Some(value) => Some(parse_value("DELETE_GRACE_PERIOD_SECS", &value)?),
            None => None,
        };

        let metrics_addr = match var("METRICS_ADDR") {
            Some(value) => Some(parse_value("METRICS_ADDR", &value)?),
            None => None,
        };

        Ok(Self {
            store,
            namespace: var("WORKLOAD_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            template,
            interval: positive_secs(&var, "RECONCILE_INTERVAL_SECS", 30)?,
            call_timeout: positive_secs(&var, "CALL_TIMEOUT_SECS", 10)?,
            fetch_timeout: positive_secs(&var, "FETCH_TIMEOUT_SECS", 15)?,
            max_concurrency,
            backoff_min,
            backoff_max,
            delete_grace_period,
            metrics_addr,
        })
    }

    /// Log the effective configuration (without the connection string)
    pub fn log_summary(&self) {
        info!("Configuration:");
        info!("  Status table: {}", self.store.table);
        info!("  Namespace: {}", self.namespace);
        info!("  Charger image: {}", self.template.image);
        info!("  Reconcile interval: {}s", self.interval.as_secs());
        info!("  Call timeout: {}s", self.call_timeout.as_secs());
        info!("  Max concurrent reconciles: {}", self.max_concurrency);
        info!(
            "  Failure backoff: {}s..{}s",
            self.backoff_min.as_secs(),
            self.backoff_max.as_secs()
        );
        match self.metrics_addr {
            Some(addr) => info!("  Metrics: http://{}/metrics", addr),
            None => info!("  Metrics: disabled"),
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        ControllerError::InvalidConfig(format!("{} has invalid value {:?}: {}", key, value, e))
    })
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn positive_secs<F>(var: &F, key: &str, default: u64) -> Result<Duration, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(var, key, default)?;
    if secs == 0 {
        return Err(ControllerError::InvalidConfig(format!(
            "{} must be greater than 0",
            key
        )));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ControllerConfig, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://db/chargers")]).unwrap();

        assert_eq!(config.store.database_url, "postgres://db/chargers");
        assert_eq!(config.store.table, "charger");
        assert_eq!(config.namespace, "golang-app");
        assert_eq!(config.template, PodTemplate::default());
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.call_timeout, Duration::from_secs(10));
        assert_eq!(config.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.backoff_min, Duration::from_secs(30));
        assert_eq!(config.backoff_max, Duration::from_secs(300));
        assert_eq!(config.delete_grace_period, None);
        assert_eq!(config.metrics_addr, None);
    }

    #[test]
    fn test_missing_database_url_is_fatal() {
        assert!(matches!(load(&[]), Err(ControllerError::InvalidConfig(_))));
        assert!(matches!(
            load(&[("DATABASE_URL", "   ")]),
            Err(ControllerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/chargers"),
            ("CHARGER_TABLE", "public.chargers"),
            ("RECONCILE_INTERVAL_SECS", "5"),
            ("CALL_TIMEOUT_SECS", "2"),
            ("MAX_CONCURRENT_RECONCILES", "32"),
            ("WORKLOAD_NAMESPACE", "chargers"),
            ("CHARGER_IMAGE", "registry.local/charger:2"),
            ("CHARGER_IMAGE_PULL_POLICY", "Always"),
            ("DELETE_GRACE_PERIOD_SECS", "0"),
            ("METRICS_ADDR", "0.0.0.0:9090"),
        ])
        .unwrap();

        assert_eq!(config.store.table, "public.chargers");
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.call_timeout, Duration::from_secs(2));
        assert_eq!(config.max_concurrency, 32);
        assert_eq!(config.namespace, "chargers");
        assert_eq!(config.template.image, "registry.local/charger:2");
        assert_eq!(config.template.image_pull_policy.as_deref(), Some("Always"));
        assert_eq!(config.delete_grace_period, Some(0));
        assert_eq!(config.metrics_addr, Some("0.0.0.0:9090".parse().unwrap()));
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        for (key, value) in [
            ("RECONCILE_INTERVAL_SECS", "thirty"),
            ("RECONCILE_INTERVAL_SECS", "0"),
            ("CALL_TIMEOUT_SECS", "-1"),
            ("MAX_CONCURRENT_RECONCILES", "0"),
            ("METRICS_ADDR", "localhost"),
            ("DB_MAX_CONNECTIONS", "many"),
        ] {
            let result = load(&[("DATABASE_URL", "postgres://db/chargers"), (key, value)]);
            assert!(
                matches!(result, Err(ControllerError::InvalidConfig(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_inverted_bounds_are_rejected() {
        assert!(load(&[
            ("DATABASE_URL", "postgres://db/chargers"),
            ("BACKOFF_MIN_SECS", "600"),
            ("BACKOFF_MAX_SECS", "60"),
        ])
        .is_err());
        assert!(load(&[
            ("DATABASE_URL", "postgres://db/chargers"),
            ("DB_MIN_CONNECTIONS", "20"),
        ])
        .is_err());
    }
}
