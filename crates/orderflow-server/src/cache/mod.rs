//! Two-tier write-back cache for orders.
//!
//! ## Architecture
//!
//! - **L1 Cache (DashMap)**: In-memory, per-instance
//! - **L2 Cache (Redis)**: Network, shared across API instances
//!
//! ## Cache Hierarchy
//!
//! ```text
//! GET /api/orders/{id} → L1 (DashMap) → L2 (Redis) → record store
//! ```
//!
//! ## Graceful Degradation
//!
//! If Redis is unavailable or disabled at startup, the system falls back
//! to L1-only mode (local cache per instance).

use std::time::Duration;

pub mod backend;
pub mod order;

pub use backend::{CacheBackend, CacheStats, CachedEntry};
pub use order::{OrderCache, OrderCacheClient};

use crate::config::RedisConfig;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Create a cache backend based on Redis configuration.
///
/// Returns a Local backend when Redis is disabled, and falls back to one
/// (with a warning) when Redis cannot be reached.
pub async fn create_cache_backend(config: &RedisConfig) -> CacheBackend {
    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let timeout = Duration::from_millis(config.timeout_ms);
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let pool_config = redis_config
        .pool
        .get_or_insert_with(|| deadpool_redis::PoolConfig::new(config.pool_size));
    pool_config.max_size = config.pool_size;
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return CacheBackend::new_local();
        }
    };

    // Test connection
    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            CacheBackend::new_redis(pool, timeout)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to local cache."
            );
            CacheBackend::new_local()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_redis_uses_local_cache() {
        let backend = create_cache_backend(&RedisConfig::default()).await;
        assert_eq!(backend.stats().mode, "local");
    }

    #[tokio::test]
    async fn unreachable_redis_falls_back_to_local_cache() {
        let config = RedisConfig {
            enabled: true,
            url: "redis://127.0.0.1:1".into(),
            pool_size: 1,
            timeout_ms: 200,
        };
        let backend = create_cache_backend(&config).await;
        assert_eq!(backend.stats().mode, "local");
    }
}
