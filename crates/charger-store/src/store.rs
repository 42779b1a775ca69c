//! Postgres-backed charger store
//!
//! Reads the charger table written by the registration service. The pool is
//! created lazily: a malformed connection string is rejected up front, while
//! an unreachable database only surfaces as a query error on the next read.

use crate::error::StoreError;
use crate::models::ChargerRecord;
use crate::store_trait::ChargerStoreTrait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Status store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Table holding `id, name, status` rows.
    pub table: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of idle connections.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,

    /// Idle connection timeout.
    pub idle_timeout: Duration,

    /// Maximum lifetime of a connection.
    pub max_lifetime: Duration,
}

impl StoreConfig {
    /// Create a configuration with default pool settings
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            table: "charger".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Charger store backed by a Postgres connection pool
#[derive(Clone)]
pub struct PgChargerStore {
    pool: PgPool,
    list_query: String,
}

impl PgChargerStore {
    /// Create a new store
    ///
    /// Fails only on configuration problems; no connection is opened here.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        if config.database_url.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "database URL is empty".to_string(),
            ));
        }
        validate_table_name(&config.table)?;

        let options = PgConnectOptions::from_str(&config.database_url)
            .map_err(|e| StoreError::InvalidConfig(format!("invalid database URL: {}", e)))?;

        info!(
            table = %config.table,
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Configuring status store connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect_lazy_with(options);

        Ok(Self {
            pool,
            list_query: format!("SELECT id, name, status FROM {} ORDER BY id", config.table),
        })
    }
}

#[async_trait::async_trait]
impl ChargerStoreTrait for PgChargerStore {
    async fn list_chargers(&self) -> Result<Vec<ChargerRecord>, StoreError> {
        debug!("Listing charger records");

        let rows = sqlx::query(&self.list_query)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            match decode_row(row) {
                Ok(record) => records.push(record),
                Err(e) => warn!(row = index, error = %e, "Skipping undecodable charger row"),
            }
        }

        debug!(count = records.len(), "Listed charger records");
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(())
    }
}

fn decode_row(row: &PgRow) -> Result<ChargerRecord, sqlx::Error> {
    // SERIAL columns are INT4, BIGSERIAL are INT8
    let id = match row.try_get::<i64, _>("id") {
        Ok(id) => id,
        Err(_) => i64::from(row.try_get::<i32, _>("id")?),
    };
    let name: Option<String> = row.try_get("name")?;
    let status: Option<String> = row.try_get("status")?;

    Ok(ChargerRecord {
        id,
        name: name.unwrap_or_default(),
        // NULL status is treated as an unknown value downstream
        status: status.unwrap_or_default(),
    })
}

/// Validate a table name so it can be interpolated into the list query.
///
/// Accepts `table` or `schema.table`, each part made of ASCII letters,
/// digits and underscores and not starting with a digit.
pub(crate) fn validate_table_name(table: &str) -> Result<(), StoreError> {
    let parts: Vec<&str> = table.split('.').collect();
    let valid = parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                }
                _ => false,
            }
        });

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidConfig(format!(
            "invalid table name: {:?}",
            table
        )))
    }
}
