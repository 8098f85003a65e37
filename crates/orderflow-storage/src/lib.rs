//! # orderflow-storage
//!
//! Record store abstraction for Orderflow.
//!
//! This crate defines the contract every record store backend implements. It
//! contains no implementation; PostgreSQL and in-memory backends live in
//! separate crates.
//!
//! ## Overview
//!
//! The main trait is [`OrderStore`], which covers:
//! - idempotent insert keyed by the order id
//! - point lookup that distinguishes "absent" from "unreachable"
//! - the daily sales view and its non-blocking refresh
//! - multi-step writes through [`OrderTransaction`]
//!
//! ## Example
//!
//! ```ignore
//! use orderflow_storage::{OrderStore, StorageError};
//!
//! async fn persist(store: &dyn OrderStore, order: &Order) -> Result<(), StorageError> {
//!     // Safe to call again when the same work item is redelivered.
//!     store.insert_if_absent(order).await?;
//!     Ok(())
//! }
//! ```

mod error;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use traits::{InsertOutcome, OrderStore, OrderTransaction};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared store trait object.
pub type DynOrderStore = std::sync::Arc<dyn OrderStore>;
