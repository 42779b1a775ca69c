//! Mock ChargerStore for unit testing
//!
//! Keeps charger records in memory and can be told to fail or stall the next
//! listings, so controller tests can exercise unreachable-store behaviour
//! without a database.

use crate::error::StoreError;
use crate::models::ChargerRecord;
use crate::store_trait::ChargerStoreTrait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock ChargerStore for testing
#[derive(Clone, Default)]
pub struct MockChargerStore {
    pub(crate) records: Arc<Mutex<Vec<ChargerRecord>>>,
    pub(crate) pending_failures: Arc<Mutex<u32>>,
    pub(crate) delay: Arc<Mutex<Option<Duration>>>,
    pub(crate) list_calls: Arc<Mutex<usize>>,
}

impl MockChargerStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock store holding the given records
    pub fn with_records(records: Vec<ChargerRecord>) -> Self {
        let store = Self::new();
        store.set_records(records);
        store
    }

    /// Replace all records
    pub fn set_records(&self, records: Vec<ChargerRecord>) {
        *self.records.lock().unwrap() = records;
    }

    /// Insert a record, replacing any record with the same id
    pub fn upsert(&self, record: ChargerRecord) {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Change the status of an existing record
    pub fn set_status(&self, id: i64, status: &str) {
        if let Some(record) = self.records.lock().unwrap().iter_mut().find(|r| r.id == id) {
            record.status = status.to_string();
        }
    }

    /// Make the next `count` listings fail with `StoreError::Unavailable`
    pub fn fail_next_list(&self, count: u32) {
        *self.pending_failures.lock().unwrap() = count;
    }

    /// Delay every listing by `delay` (used to exercise fetch timeouts)
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Number of times `list_chargers` has been called
    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ChargerStoreTrait for MockChargerStore {
    async fn list_chargers(&self) -> Result<Vec<ChargerRecord>, StoreError> {
        *self.list_calls.lock().unwrap() += 1;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut failures = self.pending_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(StoreError::Unavailable("mock store is failing".to_string()));
            }
        }

        Ok(self.records.lock().unwrap().clone())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_lists_records() {
        let store = MockChargerStore::with_records(vec![
            ChargerRecord::new(1, "A", "active"),
            ChargerRecord::new(2, "B", "disabled"),
        ]);

        let records = store.list_chargers().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_upsert_and_set_status() {
        let store = MockChargerStore::new();
        store.upsert(ChargerRecord::new(1, "A", "active"));
        store.upsert(ChargerRecord::new(1, "A2", "active"));
        store.set_status(1, "error");

        let records = store.list_chargers().await.unwrap();
        assert_eq!(records, vec![ChargerRecord::new(1, "A2", "error")]);
    }

    #[tokio::test]
    async fn test_mock_fails_requested_number_of_times() {
        let store = MockChargerStore::with_records(vec![ChargerRecord::new(1, "A", "active")]);
        store.fail_next_list(2);

        assert!(store.list_chargers().await.is_err());
        assert!(store.list_chargers().await.is_err());
        assert_eq!(store.list_chargers().await.unwrap().len(), 1);
        assert_eq!(store.list_calls(), 3);
    }
}
