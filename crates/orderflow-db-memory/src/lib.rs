//! In-memory record store backend for Orderflow.
//!
//! This crate provides an in-memory implementation of the `OrderStore` trait
//! from `orderflow-storage`. It backs single-process deployments and tests.
//!
//! # Example
//!
//! ```ignore
//! use orderflow_db_memory::InMemoryOrderStore;
//! use orderflow_storage::OrderStore;
//!
//! let store = InMemoryOrderStore::new();
//! store.insert_if_absent(&order).await?;
//! store.refresh_daily_sales().await?;
//! let rows = store.daily_sales().await?;
//! ```

pub mod storage;
pub mod transaction;

pub use orderflow_storage::{DynOrderStore, OrderStore, StorageError};
pub use storage::InMemoryOrderStore;
pub use transaction::InMemoryTransaction;

/// Creates a new shareable in-memory store.
pub fn create_order_store() -> DynOrderStore {
    std::sync::Arc::new(InMemoryOrderStore::new())
}
