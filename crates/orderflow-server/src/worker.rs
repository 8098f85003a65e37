//! Persistence worker.
//!
//! Takes accepted orders off the queue one at a time and writes them to the
//! record store, then to the search index. A message is acknowledged only
//! after both writes succeeded; any failure puts it back on the queue.
//! Both writes are idempotent by order id, so redelivery is harmless.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use orderflow_core::Order;
use orderflow_storage::{DynOrderStore, InsertOutcome, StorageError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::queue::{Delivery, DeliverySource, DynDeliverySource, QueueError};
use crate::search::{DynOrderIndexer, SearchError};

/// Pause after a failed poll before asking the queue again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// The write in flight for a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PersistingPrimary,
    PersistingProjection,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PersistingPrimary => "persisting_primary",
            Stage::PersistingProjection => "persisting_projection",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a work item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Both writes done, message acknowledged.
    Committed,
    /// A write failed at `stage`; the message was put back.
    Retried { stage: Stage },
    /// The payload could not be decoded and was dropped.
    Discarded,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Committed => "committed",
            Outcome::Retried { .. } => "retried",
            Outcome::Discarded => "discarded",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("record store write failed: {0}")]
    Store(#[from] StorageError),

    #[error("search index write failed: {0}")]
    Index(#[from] SearchError),

    #[error("message deadline of {0:?} exceeded")]
    Timeout(Duration),
}

pub struct PersistenceWorker {
    store: DynOrderStore,
    indexer: DynOrderIndexer,
    message_timeout: Duration,
}

impl PersistenceWorker {
    pub fn new(store: DynOrderStore, indexer: DynOrderIndexer, message_timeout: Duration) -> Self {
        Self {
            store,
            indexer,
            message_timeout,
        }
    }

    /// Runs one delivery to a terminal state.
    pub async fn process(&self, delivery: Delivery) -> Outcome {
        let attempt = delivery.attempt();

        let order = match delivery.decode() {
            Ok(order) => order,
            Err(e) => {
                warn!(attempt, error = %e, "Undecodable message, discarding");
                if let Err(e) = delivery.discard().await {
                    warn!(attempt, error = %e, "Failed to discard message");
                }
                return self.finish(Outcome::Discarded);
            }
        };

        let mut stage = Stage::PersistingPrimary;
        let result = tokio::time::timeout(self.message_timeout, self.persist(&order, &mut stage))
            .await
            .unwrap_or(Err(WorkerError::Timeout(self.message_timeout)));

        match result {
            Ok(inserted) => {
                if let Err(e) = delivery.ack().await {
                    // Redelivery of a committed order is a no-op
                    warn!(order_id = %order.id, attempt, error = %e, "Failed to acknowledge message");
                }
                info!(
                    order_id = %order.id,
                    attempt,
                    primary = inserted.as_str(),
                    "order persisted"
                );
                self.finish(Outcome::Committed)
            }
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    attempt,
                    stage = %stage,
                    error = %e,
                    "Failed to persist order, requeueing"
                );
                if let Err(e) = delivery.requeue().await {
                    warn!(order_id = %order.id, attempt, error = %e, "Failed to requeue message");
                }
                self.finish(Outcome::Retried { stage })
            }
        }
    }

    async fn persist(&self, order: &Order, stage: &mut Stage) -> Result<InsertOutcome, WorkerError> {
        *stage = Stage::PersistingPrimary;
        let started = Instant::now();
        let inserted = self.store.insert_if_absent(order).await;
        crate::metrics::record_db_query("insert_order", started.elapsed());
        let inserted = inserted?;

        *stage = Stage::PersistingProjection;
        self.indexer.upsert(order).await?;
        Ok(inserted)
    }

    fn finish(&self, outcome: Outcome) -> Outcome {
        crate::metrics::record_worker_outcome(outcome.as_str());
        outcome
    }

    /// Consumes until `shutdown` flips or the source closes.
    ///
    /// Shutdown is only observed between items: an item already taken off
    /// the queue always runs to a terminal state.
    pub async fn run(&self, source: &dyn DeliverySource, mut shutdown: watch::Receiver<bool>) {
        info!("Persistence worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = source.next_delivery() => next,
            };

            match next {
                Ok(Some(delivery)) => {
                    self.process(delivery).await;
                }
                Ok(None) => debug!("No messages in poll window"),
                Err(QueueError::Closed) => {
                    info!("Queue closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to poll queue");
                    tokio::select! {
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }
        info!("Persistence worker stopped");
    }

    /// Runs the worker on its own task.
    pub fn start(self: Arc<Self>, source: DynDeliverySource) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            self.run(source.as_ref(), shutdown_rx).await;
        });
        WorkerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signals shutdown and waits for the item in flight to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Persistence worker task failed");
        }
    }
}
