//! Transactional persistence for checkout.
//!
//! Every mutation of stock, orders and status history happens through a
//! [`StoreTransaction`]; nothing survives unless the transaction commits.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{FailPoint, MemoryStore, MemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{InventoryLedger, OrderRepository, Store, StoreTransaction, VariantCatalog};
