//! PostgreSQL implementation of the OrderStore trait.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use orderflow_core::{DailySale, Order};
use orderflow_storage::{InsertOutcome, OrderStore, OrderTransaction, StorageError};
use sqlx_postgres::PgPool;
use uuid::Uuid;

use crate::config::PostgresConfig;
use crate::error::map_sqlx_error;
use crate::migrations;
use crate::pool;
use crate::queries;
use crate::transaction::PostgresTransaction;

/// PostgreSQL record store.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl PostgresOrderStore {
    /// Creates a store with the given configuration.
    ///
    /// This will create a connection pool and run migrations if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        Ok(Self::from_pool(pool, &config))
    }

    /// Creates a store over an existing pool. Migrations are not run.
    #[must_use]
    pub fn from_pool(pool: PgPool, config: &PostgresConfig) -> Self {
        Self {
            pool,
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn bounded<T, F>(
        &self,
        operation: &'static str,
        limit: Duration,
        fut: F,
    ) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| StorageError::timeout(operation, limit))?
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert_if_absent(&self, order: &Order) -> Result<InsertOutcome, StorageError> {
        self.bounded("insert_if_absent", self.write_timeout, async {
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| map_sqlx_error("insert_if_absent", e))?;
            queries::orders::insert_if_absent(&mut conn, order).await
        })
        .await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Order, StorageError> {
        self.bounded("get_by_id", self.read_timeout, async {
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| map_sqlx_error("get_by_id", e))?;
            queries::orders::get_by_id(&mut conn, id).await
        })
        .await
    }

    async fn daily_sales(&self) -> Result<Vec<DailySale>, StorageError> {
        self.bounded("daily_sales", self.read_timeout, async {
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| map_sqlx_error("daily_sales", e))?;
            queries::orders::daily_sales(&mut conn).await
        })
        .await
    }

    // Bounded by the caller; a refresh can legitimately take minutes.
    async fn refresh_daily_sales(&self) -> Result<(), StorageError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("refresh_daily_sales", e))?;
        queries::orders::refresh_daily_sales(&mut conn).await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn OrderTransaction>, StorageError> {
        let tx = self
            .bounded("begin_transaction", self.write_timeout, async {
                self.pool
                    .begin()
                    .await
                    .map_err(|e| map_sqlx_error("begin_transaction", e))
            })
            .await?;
        Ok(Box::new(PostgresTransaction::new(tx, self.write_timeout)))
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
