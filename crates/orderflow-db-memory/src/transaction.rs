//! Buffered transactions for the in-memory store.

use async_trait::async_trait;
use orderflow_core::Order;
use orderflow_storage::{OrderTransaction, StorageError};

use crate::storage::OrderRows;

/// A transaction that buffers inserts and applies them under one write lock
/// at commit.
///
/// Dropping it without committing discards the buffer.
#[derive(Debug)]
pub struct InMemoryTransaction {
    rows: OrderRows,
    pending: Vec<Order>,
}

impl InMemoryTransaction {
    pub(crate) fn new(rows: OrderRows) -> Self {
        Self {
            rows,
            pending: Vec::new(),
        }
    }

    /// Number of buffered inserts.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn insert(&mut self, order: &Order) -> Result<(), StorageError> {
        if self.pending.iter().any(|o| o.id == order.id) {
            return Err(StorageError::transaction_error(format!(
                "duplicate order id {} in transaction",
                order.id
            )));
        }
        self.pending.push(order.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let Self { rows, pending } = *self;
        let mut rows = rows.write().await;
        // All or nothing: check every key before writing any.
        if let Some(existing) = pending.iter().find(|o| rows.contains_key(&o.id)) {
            return Err(StorageError::transaction_error(format!(
                "order {} already exists",
                existing.id
            )));
        }
        for order in pending {
            rows.insert(order.id, order);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        tracing::debug!(discarded = self.pending.len(), "in-memory transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use orderflow_core::NewOrder;
    use orderflow_storage::OrderStore;

    use super::*;
    use crate::InMemoryOrderStore;

    #[tokio::test]
    async fn commit_applies_all_inserts() {
        let store = InMemoryOrderStore::new();
        let first = Order::accept(NewOrder::new("Laptop", 100.0));
        let second = Order::accept(NewOrder::new("Mouse", 50.0));

        let mut tx = store.begin_transaction().await.unwrap();
        tx.insert(&first).await.unwrap();
        tx.insert(&second).await.unwrap();

        assert!(store.is_empty().await);

        tx.commit().await.unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get_by_id(second.id).await.unwrap(), second);
    }

    #[tokio::test]
    async fn rollback_and_drop_leave_no_rows() {
        let store = InMemoryOrderStore::new();

        let mut tx = store.begin_transaction().await.unwrap();
        tx.insert(&Order::accept(NewOrder::new("Laptop", 100.0)))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        {
            let mut tx = store.begin_transaction().await.unwrap();
            tx.insert(&Order::accept(NewOrder::new("Laptop", 100.0)))
                .await
                .unwrap();
        }

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn commit_conflict_writes_nothing() {
        let store = InMemoryOrderStore::new();
        let existing = Order::accept(NewOrder::new("Laptop", 100.0));
        store.insert_if_absent(&existing).await.unwrap();

        let mut tx = store.begin_transaction().await.unwrap();
        tx.insert(&Order::accept(NewOrder::new("Mouse", 50.0)))
            .await
            .unwrap();
        tx.insert(&existing).await.unwrap();

        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, StorageError::TransactionError { .. }));
        assert_eq!(store.len().await, 1);
    }
}
