//! Record store traits.
//!
//! This module defines the contract that every record store backend implements.

use async_trait::async_trait;
use orderflow_core::{DailySale, Order};
use uuid::Uuid;

use crate::error::StorageError;

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The order was written by this call.
    Inserted,
    /// A row with the same id already existed; nothing was written.
    AlreadyPresent,
}

impl InsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::AlreadyPresent => "already_present",
        }
    }
}

/// The main trait that all record store backends implement.
///
/// Implementations must be thread-safe (`Send + Sync`) and every operation is
/// expected to be bounded by a backend-specific timeout.
///
/// # Example
///
/// ```ignore
/// use orderflow_storage::{OrderStore, StorageError};
///
/// async fn lookup(store: &dyn OrderStore, id: Uuid) -> Result<Option<Order>, StorageError> {
///     match store.get_by_id(id).await {
///         Ok(order) => Ok(Some(order)),
///         Err(e) if e.is_not_found() => Ok(None),
///         Err(e) => Err(e),
///     }
/// }
/// ```
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the order unless a row with the same id already exists.
    ///
    /// Replaying the same order is never an error.
    ///
    /// # Errors
    ///
    /// Returns an error only when the backend could not be reached or the
    /// write could not be completed.
    async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, StorageError>;

    /// Reads an order by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such order exists. Every other
    /// variant means the lookup itself failed.
    async fn get_by_id(&self, id: Uuid) -> Result<Order, StorageError>;

    /// Returns the daily sales view as of its last refresh.
    ///
    /// At most [`orderflow_core::DAILY_SALES_LIMIT`] rows, newest date first.
    async fn daily_sales(&self) -> Result<Vec<DailySale>, StorageError>;

    /// Recomputes the daily sales view.
    ///
    /// Readers keep seeing the previous version until the new one is in
    /// place. Concurrent calls are allowed.
    async fn refresh_daily_sales(&self) -> Result<(), StorageError>;

    /// Begins a multi-step write.
    ///
    /// Returns a transaction handle that must be committed or rolled back.
    async fn begin_transaction(&self) -> Result<Box<dyn OrderTransaction>, StorageError>;

    /// Releases the backend's connections.
    async fn close(&self);

    /// Returns the backend name (e.g., "postgres", "memory").
    fn backend_name(&self) -> &'static str;
}

/// A record store transaction.
///
/// Nothing written through the transaction is visible to other readers
/// before [`commit`](OrderTransaction::commit). Dropping a transaction
/// without committing rolls it back.
#[async_trait]
pub trait OrderTransaction: Send + Sync {
    /// Inserts an order within the transaction.
    async fn insert(&mut self, order: &Order) -> Result<(), StorageError>;

    /// Commits the transaction, making all changes permanent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError` if the commit fails.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Rolls back the transaction, discarding all changes.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
