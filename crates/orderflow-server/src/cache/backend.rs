//! Cache backend implementation with L1 (DashMap) and L2 (Redis) tiers.

use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::CacheError;

/// Lifetime of an L1 copy in Redis mode. Redis stays the source of truth
/// for expiry; the local copy only absorbs repeated reads.
pub const L1_TTL_IN_REDIS_MODE: Duration = Duration::from_secs(60);

/// A cached entry with TTL support.
///
/// The data is wrapped in `Arc` so cache hits clone a pointer, not the bytes.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Two-tier cache backend: L1 (DashMap) + L2 (Redis).
///
/// ## Cache Modes
///
/// - **Local**: Single-instance mode using only DashMap
/// - **Redis**: Multi-instance mode with DashMap (L1) + Redis (L2)
///
/// Writes in Redis mode are awaited: once `set` returns `Ok`, every instance
/// reading through Redis sees the value.
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: local DashMap only
    Local(Arc<DashMap<String, CachedEntry>>),

    /// Multi-instance: Redis + local L1
    Redis {
        redis: Pool,
        local: Arc<DashMap<String, CachedEntry>>,
        /// Deadline for a single Redis round trip
        timeout: Duration,
    },
}

impl CacheBackend {
    /// Create a new local-only cache backend.
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    /// Create a new Redis-backed cache backend.
    pub fn new_redis(redis_pool: Pool, timeout: Duration) -> Self {
        CacheBackend::Redis {
            redis: redis_pool,
            local: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Get a value from the cache.
    ///
    /// Checks L1 first, then L2. A value found in L2 is promoted to L1.
    /// Expired entries count as misses.
    ///
    /// # Errors
    ///
    /// Returns an error only in Redis mode, when L2 could not be asked.
    pub async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
        match self {
            CacheBackend::Local(map) => {
                let result = lookup_local(map, key);

                if result.is_some() {
                    crate::metrics::record_cache_hit("L1");
                } else {
                    crate::metrics::record_cache_miss();
                }

                Ok(result)
            }
            CacheBackend::Redis {
                redis,
                local,
                timeout,
            } => {
                if let Some(data) = lookup_local(local, key) {
                    tracing::debug!(key = %key, "cache hit (L1)");
                    crate::metrics::record_cache_hit("L1");
                    return Ok(Some(data));
                }

                let found: Option<Vec<u8>> = bounded(*timeout, async {
                    let mut conn = redis.get().await?;
                    let value: Option<Vec<u8>> = conn.get(key).await?;
                    Ok::<_, CacheError>(value)
                })
                .await?;

                match found {
                    Some(data) => {
                        tracing::debug!(key = %key, "cache hit (L2)");
                        crate::metrics::record_cache_hit("L2");

                        let entry = CachedEntry::new(data, L1_TTL_IN_REDIS_MODE);
                        let data_arc = Arc::clone(&entry.data);
                        local.insert(key.to_string(), entry);

                        Ok(Some(data_arc))
                    }
                    None => {
                        tracing::debug!(key = %key, "cache miss");
                        crate::metrics::record_cache_miss();
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Set a value in the cache with TTL.
    ///
    /// - **Local mode**: Write to DashMap only
    /// - **Redis mode**: Write to L2 and wait for the reply, then to L1
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
                Ok(())
            }
            CacheBackend::Redis {
                redis,
                local,
                timeout,
            } => {
                let entry = CachedEntry::new(value, ttl.min(L1_TTL_IN_REDIS_MODE));
                // SETEX rejects a zero expiry
                let ttl_secs = ttl.as_secs().max(1);

                bounded(*timeout, async {
                    let mut conn = redis.get().await?;
                    conn.set_ex::<_, _, ()>(key, entry.data.as_slice(), ttl_secs)
                        .await?;
                    Ok::<_, CacheError>(())
                })
                .await?;

                tracing::debug!(key = %key, ttl_secs, "cache set (L1+L2)");
                local.insert(key.to_string(), entry);
                Ok(())
            }
        }
    }

    /// Invalidate a cache entry in every tier.
    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.remove(key);
                tracing::debug!(key = %key, "cache invalidated (local)");
                Ok(())
            }
            CacheBackend::Redis {
                redis,
                local,
                timeout,
            } => {
                local.remove(key);

                bounded(*timeout, async {
                    let mut conn = redis.get().await?;
                    conn.del::<_, ()>(key).await?;
                    Ok::<_, CacheError>(())
                })
                .await?;

                tracing::debug!(key = %key, "cache invalidated (L1+L2)");
                Ok(())
            }
        }
    }

    /// Drops expired L1 entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let local = self.local_cache();
        let before = local.len();
        local.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(local.len());
        crate::metrics::set_cache_entries("L1", local.len());
        removed
    }

    /// Get cache statistics (L1 only).
    pub fn stats(&self) -> CacheStats {
        match self {
            CacheBackend::Local(map) => CacheStats {
                l1_entries: map.len(),
                mode: "local".to_string(),
            },
            CacheBackend::Redis { local, .. } => CacheStats {
                l1_entries: local.len(),
                mode: "redis".to_string(),
            },
        }
    }

    /// Check if Redis is available (for health checks).
    pub async fn is_redis_available(&self) -> bool {
        match self {
            CacheBackend::Local(_) => false,
            CacheBackend::Redis { redis, .. } => redis.get().await.is_ok(),
        }
    }

    pub fn local_cache(&self) -> &Arc<DashMap<String, CachedEntry>> {
        match self {
            CacheBackend::Local(map) => map,
            CacheBackend::Redis { local, .. } => local,
        }
    }
}

fn lookup_local(map: &DashMap<String, CachedEntry>, key: &str) -> Option<Arc<Vec<u8>>> {
    let entry = map.get(key)?;
    if entry.is_expired() {
        drop(entry);
        map.remove(key);
        return None;
    }
    Some(Arc::clone(&entry.data))
}

async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, CacheError>>,
) -> Result<T, CacheError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| CacheError::Timeout(timeout))?
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub l1_entries: usize,
    pub mode: String,
}
