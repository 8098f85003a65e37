//! Construction of the shared clients used by the API and the worker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use orderflow_storage::DynOrderStore;
use tokio::task::JoinHandle;

use crate::cache::{CacheBackend, OrderCacheClient, create_cache_backend};
use crate::config::{AppConfig, QueueBackend, SearchBackend, StorageBackend};
use crate::handlers::AppState;
use crate::queue::{DynDeliverySource, DynOrderPublisher, JetStreamQueue, MemoryQueue};
use crate::scheduler::ViewRefresher;
use crate::search::{DynOrderIndexer, DynOrderSearch, ElasticsearchClient, MemorySearchIndex};
use crate::worker::PersistenceWorker;

/// How often expired L1 cache entries are dropped.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Every external client, created once per process.
pub struct Infrastructure {
    pub store: DynOrderStore,
    pub cache_backend: CacheBackend,
    pub cache: Arc<OrderCacheClient>,
    pub publisher: DynOrderPublisher,
    pub deliveries: DynDeliverySource,
    pub indexer: DynOrderIndexer,
    pub search: DynOrderSearch,
    cache_sweeper: JoinHandle<()>,
}

impl Infrastructure {
    pub async fn connect(cfg: &AppConfig) -> anyhow::Result<Self> {
        let store = connect_store(cfg).await?;

        let cache_backend = create_cache_backend(&cfg.redis).await;
        let cache = Arc::new(OrderCacheClient::new(
            cache_backend.clone(),
            cfg.cache.order_ttl(),
        ));

        let (publisher, deliveries) = connect_queue(cfg).await?;
        let (indexer, search) = connect_search(cfg)?;

        let cache_sweeper = spawn_cache_sweeper(cache_backend.clone());

        Ok(Self {
            store,
            cache_backend,
            cache,
            publisher,
            deliveries,
            indexer,
            search,
            cache_sweeper,
        })
    }

    pub fn app_state(&self, cfg: &AppConfig) -> AppState {
        AppState {
            store: self.store.clone(),
            cache: self.cache.clone(),
            publisher: self.publisher.clone(),
            search: self.search.clone(),
            refresher: self.refresher(cfg),
        }
    }

    pub fn refresher(&self, cfg: &AppConfig) -> ViewRefresher {
        ViewRefresher::new(self.store.clone(), cfg.refresh.timeout())
    }

    pub fn worker(&self, cfg: &AppConfig) -> PersistenceWorker {
        PersistenceWorker::new(
            self.store.clone(),
            self.indexer.clone(),
            cfg.worker.message_timeout(),
        )
    }

    /// Flushes the queue and releases store connections.
    pub async fn shutdown(self) {
        self.cache_sweeper.abort();
        self.publisher.close().await;
        self.store.close().await;
        tracing::info!("Shared clients closed");
    }
}

/// Clients a standalone worker needs: no cache and no HTTP-facing search.
pub struct WorkerInfrastructure {
    pub store: DynOrderStore,
    pub indexer: DynOrderIndexer,
    pub deliveries: DynDeliverySource,
    queue: DynOrderPublisher,
}

impl WorkerInfrastructure {
    pub async fn connect(cfg: &AppConfig) -> anyhow::Result<Self> {
        let store = connect_store(cfg).await?;
        let (queue, deliveries) = connect_queue(cfg).await?;
        let (indexer, _) = connect_search(cfg)?;

        Ok(Self {
            store,
            indexer,
            deliveries,
            queue,
        })
    }

    pub fn worker(&self, cfg: &AppConfig) -> PersistenceWorker {
        PersistenceWorker::new(
            self.store.clone(),
            self.indexer.clone(),
            cfg.worker.message_timeout(),
        )
    }

    /// Flushes pending acknowledgements and releases store connections.
    pub async fn shutdown(self) {
        self.queue.close().await;
        self.store.close().await;
        tracing::info!("Shared clients closed");
    }
}

async fn connect_store(cfg: &AppConfig) -> anyhow::Result<DynOrderStore> {
    let store: DynOrderStore = match cfg.storage.backend {
        StorageBackend::Postgres => {
            orderflow_db_postgres::create_order_store(cfg.storage.postgres.clone())
                .await
                .context("failed to initialize PostgreSQL record store")?
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory record store; orders are lost on restart");
            orderflow_db_memory::create_order_store()
        }
    };
    tracing::info!(backend = store.backend_name(), "Record store ready");
    Ok(store)
}

async fn connect_queue(
    cfg: &AppConfig,
) -> anyhow::Result<(DynOrderPublisher, DynDeliverySource)> {
    Ok(match cfg.queue.backend {
        QueueBackend::Nats => {
            let queue = Arc::new(
                JetStreamQueue::connect(&cfg.queue)
                    .await
                    .context("failed to connect to NATS JetStream")?,
            );
            (queue.clone(), queue)
        }
        QueueBackend::Memory => {
            let queue = Arc::new(MemoryQueue::new(cfg.queue.poll_interval()));
            (queue.clone(), queue)
        }
    })
}

fn connect_search(cfg: &AppConfig) -> anyhow::Result<(DynOrderIndexer, DynOrderSearch)> {
    Ok(match cfg.search.backend {
        SearchBackend::Elasticsearch => {
            let client = Arc::new(
                ElasticsearchClient::new(&cfg.search)
                    .context("failed to build Elasticsearch client")?,
            );
            (client.clone(), client)
        }
        SearchBackend::Memory => {
            let index = Arc::new(MemorySearchIndex::new());
            (index.clone(), index)
        }
    })
}

fn spawn_cache_sweeper(backend: CacheBackend) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = backend.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "Expired cache entries dropped");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_core::{NewOrder, Order};

    fn memory_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.storage.backend = StorageBackend::Memory;
        cfg.queue.backend = QueueBackend::Memory;
        cfg.search.backend = SearchBackend::Memory;
        cfg.worker.embedded = true;
        // Unreachable: the worker clients must not need Redis
        cfg.redis.enabled = true;
        cfg.redis.url = "redis://127.0.0.1:1".into();
        cfg
    }

    #[tokio::test]
    async fn worker_clients_persist_without_a_cache() {
        let cfg = memory_config();
        let infra = WorkerInfrastructure::connect(&cfg).await.unwrap();

        let order = Order::accept(NewOrder::new("Laptop", 1299.99));
        infra.queue.publish(&order).await.unwrap();

        let delivery = infra.deliveries.next_delivery().await.unwrap().unwrap();
        let outcome = infra.worker(&cfg).process(delivery).await;

        assert_eq!(outcome, crate::worker::Outcome::Committed);
        assert_eq!(infra.store.get_by_id(order.id).await.unwrap(), order);
        infra.shutdown().await;
    }
}
