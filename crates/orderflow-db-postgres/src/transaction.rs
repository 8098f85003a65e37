//! PostgreSQL transaction for multi-step order writes.

use std::time::Duration;

use async_trait::async_trait;
use orderflow_core::Order;
use orderflow_storage::{OrderTransaction, StorageError};
use sqlx_postgres::PgTransaction;
use tokio::sync::Mutex;

use crate::queries;

const COMPLETED: &str = "Transaction already completed (committed or rolled back)";

/// Wraps an sqlx transaction.
///
/// The inner transaction is held in an `Option` so commit and rollback can
/// take ownership of it. sqlx issues a ROLLBACK when a transaction is dropped
/// unfinished.
pub struct PostgresTransaction {
    tx: Mutex<Option<Box<PgTransaction<'static>>>>,
    write_timeout: Duration,
}

impl PostgresTransaction {
    pub fn new(tx: PgTransaction<'static>, write_timeout: Duration) -> Self {
        Self {
            tx: Mutex::new(Some(Box::new(tx))),
            write_timeout,
        }
    }
}

#[async_trait]
impl OrderTransaction for PostgresTransaction {
    async fn insert(&mut self, order: &Order) -> Result<(), StorageError> {
        let tx = self
            .tx
            .get_mut()
            .as_deref_mut()
            .ok_or_else(|| StorageError::transaction_error(COMPLETED))?;
        tokio::time::timeout(self.write_timeout, queries::orders::insert(&mut **tx, order))
            .await
            .map_err(|_| StorageError::timeout("transaction_insert", self.write_timeout))?
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        if let Some(tx) = self.tx.lock().await.take() {
            tokio::time::timeout(self.write_timeout, tx.commit())
                .await
                .map_err(|_| StorageError::timeout("commit", self.write_timeout))?
                .map_err(|e| {
                    StorageError::transaction_error(format!("Failed to commit transaction: {e}"))
                })?;
            tracing::debug!("Transaction committed");
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        if let Some(tx) = self.tx.lock().await.take() {
            tx.rollback().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to rollback transaction: {e}"))
            })?;
            tracing::debug!("Transaction rolled back");
        }
        Ok(())
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.tx.get_mut().is_some() {
            tracing::warn!(
                "PostgresTransaction dropped without explicit commit/rollback - will auto-rollback"
            );
        }
    }
}
