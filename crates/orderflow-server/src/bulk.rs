//! Two-step order write inside one record store transaction.

use orderflow_core::{BulkOrderRequest, Order};
use orderflow_storage::{OrderStore, OrderTransaction, StorageError};

/// Writes both orders of `request` or neither.
///
/// A second item named [`BulkOrderRequest::FAILURE_SENTINEL`] fails the
/// second step, exercising the rollback path.
pub async fn process_bulk_order(
    store: &dyn OrderStore,
    request: &BulkOrderRequest,
) -> Result<Vec<Order>, StorageError> {
    let mut tx = store.begin_transaction().await?;

    match write_steps(tx.as_mut(), request).await {
        Ok(orders) => {
            tx.commit().await?;
            tracing::info!(
                first = %orders[0].id,
                second = %orders[1].id,
                "bulk order committed"
            );
            Ok(orders)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "Failed to roll back bulk order");
            }
            tracing::warn!(error = %e, "bulk order rolled back");
            Err(e)
        }
    }
}

async fn write_steps(
    tx: &mut dyn OrderTransaction,
    request: &BulkOrderRequest,
) -> Result<Vec<Order>, StorageError> {
    let first = request.first_order();
    tx.insert(&first).await?;

    if request.forces_failure() {
        return Err(StorageError::transaction_error("simulated failure at step 2"));
    }

    let second = request.second_order();
    tx.insert(&second).await?;

    Ok(vec![first, second])
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_db_memory::InMemoryOrderStore;

    #[tokio::test]
    async fn both_steps_commit_together() {
        let store = InMemoryOrderStore::new();
        let orders = process_bulk_order(&store, &BulkOrderRequest::new("Laptop", "Mouse"))
            .await
            .unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].amount, BulkOrderRequest::FIRST_ITEM_AMOUNT);
        assert_eq!(orders[1].amount, BulkOrderRequest::SECOND_ITEM_AMOUNT);
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get_by_id(orders[1].id).await.unwrap().product_name, "Mouse");
    }

    #[tokio::test]
    async fn failing_second_step_leaves_nothing() {
        let store = InMemoryOrderStore::new();
        let err = process_bulk_order(&store, &BulkOrderRequest::new("Laptop", "ERROR"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("simulated failure at step 2"));
        assert!(store.is_empty().await);
    }
}
