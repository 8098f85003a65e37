//! In-process queue for single-process deployments and tests.
//!
//! FIFO over an unbounded channel. Nothing survives a restart.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use orderflow_core::Order;
use tokio::sync::{Mutex, mpsc};

use super::{Acknowledger, Delivery, DeliverySource, OrderPublisher, QueueError};

#[derive(Debug)]
struct Envelope {
    payload: Bytes,
    attempt: u64,
}

#[derive(Debug)]
struct Inner {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    poll_interval: Duration,
    closed: AtomicBool,
    published: AtomicU64,
    acked: AtomicU64,
    requeued: AtomicU64,
    discarded: AtomicU64,
    depth: AtomicU64,
}

impl Inner {
    fn enqueue(&self, envelope: Envelope) -> Result<(), QueueError> {
        // Counted before sending so a fast receiver never drives it below zero
        self.depth.fetch_add(1, Ordering::Relaxed);
        self.tx.send(envelope).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            QueueError::Closed
        })
    }

    fn requeue(&self, envelope: Envelope) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
        let retry = Envelope {
            payload: envelope.payload,
            attempt: envelope.attempt + 1,
        };
        if self.enqueue(retry).is_err() {
            tracing::warn!("in-memory queue dropped a requeued message");
        }
    }
}

/// Counters for an in-memory queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub published: u64,
    pub acked: u64,
    pub requeued: u64,
    pub discarded: u64,
    /// Messages waiting to be delivered
    pub depth: u64,
}

#[derive(Debug, Clone)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

impl MemoryQueue {
    pub fn new(poll_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                tx,
                rx: Mutex::new(rx),
                poll_interval,
                closed: AtomicBool::new(false),
                published: AtomicU64::new(0),
                acked: AtomicU64::new(0),
                requeued: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
                depth: AtomicU64::new(0),
            }),
        }
    }

    /// Stops accepting publishes. Messages already queued are still delivered.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub fn stats(&self) -> QueueStats {
        let inner = &self.inner;
        QueueStats {
            published: inner.published.load(Ordering::Relaxed),
            acked: inner.acked.load(Ordering::Relaxed),
            requeued: inner.requeued.load(Ordering::Relaxed),
            discarded: inner.discarded.load(Ordering::Relaxed),
            depth: inner.depth.load(Ordering::Relaxed),
        }
    }

    /// Enqueues raw bytes as if a producer had published them.
    pub fn publish_raw(&self, payload: impl Into<Bytes>) -> Result<(), QueueError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        self.inner.enqueue(Envelope {
            payload: payload.into(),
            attempt: 1,
        })?;
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl OrderPublisher for MemoryQueue {
    async fn publish(&self, order: &Order) -> Result<(), QueueError> {
        self.publish_raw(order.to_json_bytes()?)
    }

    async fn close(&self) {
        self.shutdown();
    }
}

#[async_trait]
impl DeliverySource for MemoryQueue {
    async fn next_delivery(&self) -> Result<Option<Delivery>, QueueError> {
        let mut rx = self.inner.rx.lock().await;

        let received = match rx.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(_) if self.inner.closed.load(Ordering::Acquire) => {
                return Err(QueueError::Closed);
            }
            Err(_) => tokio::time::timeout(self.inner.poll_interval, rx.recv())
                .await
                .ok()
                .flatten(),
        };

        let Some(envelope) = received else {
            return Ok(None);
        };
        self.inner.depth.fetch_sub(1, Ordering::Relaxed);

        Ok(Some(Delivery::new(
            envelope.payload.clone(),
            envelope.attempt,
            Box::new(MemoryAcker {
                inner: Arc::clone(&self.inner),
                envelope: Some(envelope),
            }),
        )))
    }
}

/// Settles an in-memory delivery. Dropped unsettled, it requeues.
struct MemoryAcker {
    inner: Arc<Inner>,
    envelope: Option<Envelope>,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        let mut this = self;
        this.envelope.take();
        this.inner.acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn requeue(self: Box<Self>) -> Result<(), QueueError> {
        let mut this = self;
        if let Some(envelope) = this.envelope.take() {
            this.inner.requeue(envelope);
        }
        Ok(())
    }

    async fn discard(self: Box<Self>) -> Result<(), QueueError> {
        let mut this = self;
        this.envelope.take();
        this.inner.discarded.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if let Some(envelope) = self.envelope.take() {
            tracing::debug!("unsettled in-memory delivery dropped, requeueing");
            self.inner.requeue(envelope);
        }
    }
}
