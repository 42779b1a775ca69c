//! ChargerStore trait for mocking
//!
//! The controller only depends on this trait, so tests can swap the Postgres
//! store for an in-memory one.

use crate::error::StoreError;
use crate::models::ChargerRecord;

/// Trait for status store operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ChargerStoreTrait: Send + Sync {
    /// List every charger record currently in the store
    async fn list_chargers(&self) -> Result<Vec<ChargerRecord>, StoreError>;

    /// Check that the store is reachable
    async fn health_check(&self) -> Result<(), StoreError>;
}
