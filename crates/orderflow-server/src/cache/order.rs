//! Write-back order cache.
//!
//! Holds accepted orders so they are readable before the worker persists
//! them, and absorbs repeated reads of persisted ones.
//!
//! ## Cache Key Format
//!
//! `order:{id}`, e.g. `order:550e8400-e29b-41d4-a716-446655440000`

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use orderflow_core::Order;
use uuid::Uuid;

use super::CacheError;
use super::backend::CacheBackend;

/// Read/write access to cached orders.
#[async_trait]
pub trait OrderCache: Send + Sync {
    /// Stores the order under its id with the configured TTL.
    async fn put(&self, order: &Order) -> Result<(), CacheError>;

    /// Returns the cached order, or `None` on a miss.
    async fn get(&self, id: Uuid) -> Result<Option<Order>, CacheError>;

    /// Drops the entry for `id` from every tier.
    async fn remove(&self, id: Uuid) -> Result<(), CacheError>;
}

/// Cached order entry serialized as MessagePack for compact storage.
#[derive(serde::Serialize, serde::Deserialize)]
struct CachedOrder {
    id: [u8; 16],
    product_name: String,
    amount: f64,
    created_at_us: i64,
}

impl CachedOrder {
    fn from_order(order: &Order) -> Self {
        Self {
            id: *order.id.as_bytes(),
            product_name: order.product_name.clone(),
            amount: order.amount,
            created_at_us: order.created_at.timestamp_micros(),
        }
    }

    fn into_order(self) -> Option<Order> {
        let created_at = DateTime::from_timestamp_micros(self.created_at_us)?;
        Some(Order::with_id(
            Uuid::from_bytes(self.id),
            self.product_name,
            self.amount,
            created_at,
        ))
    }
}

/// [`OrderCache`] over a [`CacheBackend`].
#[derive(Clone)]
pub struct OrderCacheClient {
    backend: CacheBackend,
    ttl: Duration,
}

impl OrderCacheClient {
    pub fn new(backend: CacheBackend, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    #[inline]
    fn cache_key(id: Uuid) -> String {
        format!("order:{id}")
    }

    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }
}

#[async_trait]
impl OrderCache for OrderCacheClient {
    async fn put(&self, order: &Order) -> Result<(), CacheError> {
        let key = Self::cache_key(order.id);
        let data = rmp_serde::to_vec(&CachedOrder::from_order(order))?;
        self.backend.set(&key, data, self.ttl).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, CacheError> {
        let key = Self::cache_key(id);
        let Some(data) = self.backend.get(&key).await? else {
            return Ok(None);
        };

        let decoded = rmp_serde::from_slice::<CachedOrder>(&data)
            .ok()
            .and_then(CachedOrder::into_order);
        match decoded {
            Some(order) => Ok(Some(order)),
            None => {
                tracing::warn!(key = %key, "Failed to decode cached order, dropping entry");
                if let Err(e) = self.backend.invalidate(&key).await {
                    tracing::warn!(key = %key, error = %e, "Failed to invalidate corrupt cache entry");
                }
                Ok(None)
            }
        }
    }

    async fn remove(&self, id: Uuid) -> Result<(), CacheError> {
        self.backend.invalidate(&Self::cache_key(id)).await
    }
}
