//! Durable hand-off between the API and the persistence worker.
//!
//! The producer side is [`OrderPublisher`]; the consumer side is
//! [`DeliverySource`], which yields one [`Delivery`] at a time. A delivery
//! must end in exactly one of `ack`, `requeue` or `discard`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use orderflow_core::{CoreError, Order};

pub mod memory;
pub mod nats;

pub use memory::{MemoryQueue, QueueStats};
pub use nats::JetStreamQueue;

pub type DynOrderPublisher = Arc<dyn OrderPublisher>;
pub type DynDeliverySource = Arc<dyn DeliverySource>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("failed to connect to queue: {0}")]
    Connect(String),

    #[error("failed to publish: {0}")]
    Publish(String),

    #[error("failed to receive: {0}")]
    Consume(String),

    #[error("failed to settle delivery: {0}")]
    Ack(String),

    #[error("queue operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("queue is closed")]
    Closed,

    #[error("failed to encode order: {0}")]
    Encode(#[from] CoreError),
}

/// Producer side of the queue.
#[async_trait]
pub trait OrderPublisher: Send + Sync {
    /// Hands the order to the queue.
    ///
    /// Returns `Ok` only once the queue has taken responsibility for it.
    async fn publish(&self, order: &Order) -> Result<(), QueueError>;

    /// Flushes buffered publishes and stops accepting new ones.
    async fn close(&self) {}
}

/// Consumer side of the queue.
#[async_trait]
pub trait DeliverySource: Send + Sync {
    /// Waits up to one poll window for the next message.
    ///
    /// `Ok(None)` means nothing arrived in time. `Err(QueueError::Closed)`
    /// means no more messages will ever arrive.
    async fn next_delivery(&self) -> Result<Option<Delivery>, QueueError>;
}

/// Settles a delivery with the broker that handed it out.
#[async_trait]
pub trait Acknowledger: Send {
    async fn ack(self: Box<Self>) -> Result<(), QueueError>;
    async fn requeue(self: Box<Self>) -> Result<(), QueueError>;
    async fn discard(self: Box<Self>) -> Result<(), QueueError>;
}

/// One message handed to a consumer.
pub struct Delivery {
    payload: Bytes,
    attempt: u64,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(payload: Bytes, attempt: u64, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            payload,
            attempt,
            acker,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// 1 for the first delivery, incremented on every redelivery.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn decode(&self) -> Result<Order, CoreError> {
        Order::from_json_bytes(&self.payload)
    }

    /// Marks the message as done; it will not be delivered again.
    pub async fn ack(self) -> Result<(), QueueError> {
        self.acker.ack().await
    }

    /// Returns the message to the queue for another attempt.
    pub async fn requeue(self) -> Result<(), QueueError> {
        self.acker.requeue().await
    }

    /// Drops a message that can never be processed.
    pub async fn discard(self) -> Result<(), QueueError> {
        self.acker.discard().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}
