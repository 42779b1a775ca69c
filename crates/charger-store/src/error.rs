//! Charger store errors

use thiserror::Error;

/// Errors that can occur when reading from the status store
#[derive(Debug, Error)]
pub enum StoreError {
    /// A query against the status store failed
    #[error("Database query error: {0}")]
    Query(#[from] sqlx::Error),

    /// Store configuration is invalid (bad connection string, table name, ...)
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    /// The store is temporarily unavailable
    #[error("Status store unavailable: {0}")]
    Unavailable(String),
}

/// A status value that is not one of the known declared statuses.
///
/// Unknown values are never fatal: the record is skipped and the cluster is
/// left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown charger status: {0:?}")]
pub struct UnknownStatus(pub String);
