use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use orderflow_core::{DAILY_SALES_LIMIT, DailySale, Order};
use orderflow_storage::{InsertOutcome, OrderStore, OrderTransaction, StorageError};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::transaction::InMemoryTransaction;

pub(crate) type OrderRows = Arc<RwLock<HashMap<Uuid, Order>>>;

/// In-memory record store.
///
/// Rows live behind a `tokio` `RwLock`. The daily sales view is a snapshot
/// behind an `ArcSwap`: a refresh builds a new snapshot and swaps it in, so
/// readers never wait on a refresh and never see a half-built view.
#[derive(Debug)]
pub struct InMemoryOrderStore {
    rows: OrderRows,
    daily_sales: ArcSwap<Vec<DailySale>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            daily_sales: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Number of persisted orders.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, StorageError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&order.id) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        rows.insert(order.id, order.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Order, StorageError> {
        self.rows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(id))
    }

    async fn daily_sales(&self) -> Result<Vec<DailySale>, StorageError> {
        let snapshot = self.daily_sales.load();
        Ok(snapshot.iter().take(DAILY_SALES_LIMIT).cloned().collect())
    }

    async fn refresh_daily_sales(&self) -> Result<(), StorageError> {
        let fresh = {
            let rows = self.rows.read().await;
            DailySale::aggregate(rows.values())
        };
        self.daily_sales.store(Arc::new(fresh));
        tracing::debug!(backend = "memory", "daily sales view refreshed");
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn OrderTransaction>, StorageError> {
        Ok(Box::new(InMemoryTransaction::new(Arc::clone(&self.rows))))
    }

    async fn close(&self) {}

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use orderflow_core::NewOrder;

    #[tokio::test]
    async fn insert_is_idempotent_by_id() {
        let store = InMemoryOrderStore::new();
        let order = Order::accept(NewOrder::new("Laptop", 1299.99));

        assert_eq!(
            store.insert_if_absent(&order).await.unwrap(),
            InsertOutcome::Inserted
        );
        for _ in 0..3 {
            assert_eq!(
                store.insert_if_absent(&order).await.unwrap(),
                InsertOutcome::AlreadyPresent
            );
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn replay_keeps_first_write() {
        let store = InMemoryOrderStore::new();
        let order = Order::accept(NewOrder::new("Laptop", 1299.99));
        store.insert_if_absent(&order).await.unwrap();

        let mut replay = order.clone();
        replay.amount = 1.0;
        store.insert_if_absent(&replay).await.unwrap();

        assert_eq!(store.get_by_id(order.id).await.unwrap().amount, 1299.99);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let store = InMemoryOrderStore::new();
        let err = store.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn view_reflects_last_refresh_only() {
        let store = InMemoryOrderStore::new();
        store
            .insert_if_absent(&Order::accept(NewOrder::new("Laptop", 10.0)))
            .await
            .unwrap();

        assert!(store.daily_sales().await.unwrap().is_empty());

        store.refresh_daily_sales().await.unwrap();
        let rows = store.daily_sales().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_revenue, 10.0);

        store
            .insert_if_absent(&Order::accept(NewOrder::new("Mouse", 5.0)))
            .await
            .unwrap();
        assert_eq!(store.daily_sales().await.unwrap()[0].total_revenue, 10.0);

        store.refresh_daily_sales().await.unwrap();
        assert_eq!(store.daily_sales().await.unwrap()[0].total_revenue, 15.0);
    }

    #[tokio::test]
    async fn view_is_capped_and_newest_first() {
        let store = InMemoryOrderStore::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        for day in 0..45 {
            let order = Order::with_id(
                Uuid::new_v4(),
                "Widget",
                day as f64,
                start + Duration::days(day),
            );
            store.insert_if_absent(&order).await.unwrap();
        }

        store.refresh_daily_sales().await.unwrap();
        let rows = store.daily_sales().await.unwrap();

        assert_eq!(rows.len(), DAILY_SALES_LIMIT);
        assert!(rows.windows(2).all(|w| w[0].date > w[1].date));
        assert_eq!(rows[0].date, (start + Duration::days(44)).date_naive());
        assert_eq!(rows[0].total_revenue, 44.0);
    }
}
