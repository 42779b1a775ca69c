//! Charger Status Store
//!
//! Read-only access to the charger status records that drive the charger
//! controller. The store is owned by an external registration service; this
//! crate only lists `{id, name, status}` rows and validates the status value
//! locally.
//!
//! # Example
//!
//! ```no_run
//! use charger_store::{ChargerStoreTrait, PgChargerStore, StoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::new("postgres://charger@db/chargers");
//! let store = PgChargerStore::new(&config)?;
//!
//! for record in store.list_chargers().await? {
//!     match record.declared_status() {
//!         Ok(status) => println!("{} is {}", record.name, status),
//!         Err(e) => println!("{} skipped: {}", record.name, e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod models;
pub mod store;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use error::{StoreError, UnknownStatus};
pub use models::{ChargerRecord, DeclaredStatus};
pub use store::{PgChargerStore, StoreConfig};
pub use store_trait::ChargerStoreTrait;
#[cfg(feature = "test-util")]
pub use mock::MockChargerStore;
