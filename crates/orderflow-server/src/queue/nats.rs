//! NATS JetStream queue.
//!
//! Orders are published to a file-backed work-queue stream and consumed
//! through one durable pull consumer shared by every worker process. The
//! broker redelivers anything not acknowledged within `ack_wait`.

use async_nats::jetstream::{self, AckKind, consumer::PullConsumer};
use async_trait::async_trait;
use futures_util::StreamExt;
use orderflow_core::Order;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{Acknowledger, Delivery, DeliverySource, OrderPublisher, QueueError};
use crate::config::QueueConfig;

pub struct JetStreamQueue {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    stream: jetstream::stream::Stream,
    consumer: OnceCell<PullConsumer>,
    config: QueueConfig,
}

impl JetStreamQueue {
    /// Connects and makes sure the stream exists.
    ///
    /// The consumer is created on the first call to `next_delivery`, so a
    /// publish-only process never registers one.
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        info!(url = %config.url, stream = %config.stream, "Connecting to NATS");
        let client = async_nats::connect(config.url.as_str())
            .await
            .map_err(|e| QueueError::Connect(e.to_string()))?;
        let jetstream = jetstream::new(client.clone());

        let stream = jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: vec![config.subject.clone()],
                retention: jetstream::stream::RetentionPolicy::WorkQueue,
                storage: jetstream::stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| QueueError::Connect(format!("failed to create stream: {e}")))?;

        info!(
            stream = %config.stream,
            subject = %config.subject,
            "Using JetStream stream"
        );

        Ok(Self {
            client,
            jetstream,
            stream,
            consumer: OnceCell::new(),
            config: config.clone(),
        })
    }

    async fn consumer(&self) -> Result<&PullConsumer, QueueError> {
        self.consumer
            .get_or_try_init(|| async {
                let consumer = self
                    .stream
                    .get_or_create_consumer(
                        &self.config.consumer,
                        jetstream::consumer::pull::Config {
                            durable_name: Some(self.config.consumer.clone()),
                            ack_policy: jetstream::consumer::AckPolicy::Explicit,
                            ack_wait: self.config.ack_wait(),
                            filter_subject: self.config.subject.clone(),
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|e| QueueError::Consume(format!("failed to create consumer: {e}")))?;
                info!(consumer = %self.config.consumer, "Using durable consumer");
                Ok::<_, QueueError>(consumer)
            })
            .await
    }
}

#[async_trait]
impl OrderPublisher for JetStreamQueue {
    async fn publish(&self, order: &Order) -> Result<(), QueueError> {
        let payload = order.to_json_bytes()?;
        let deadline = self.config.publish_timeout();

        // The second await is the stream's storage acknowledgement
        let published = tokio::time::timeout(deadline, async {
            self.jetstream
                .publish(self.config.subject.clone(), payload.into())
                .await
                .map_err(|e| QueueError::Publish(e.to_string()))?
                .await
                .map_err(|e| QueueError::Publish(e.to_string()))
        })
        .await
        .map_err(|_| QueueError::Timeout(deadline))??;

        debug!(order_id = %order.id, sequence = published.sequence, "order published");
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "Failed to flush NATS connection");
        }
    }
}

#[async_trait]
impl DeliverySource for JetStreamQueue {
    async fn next_delivery(&self) -> Result<Option<Delivery>, QueueError> {
        let consumer = self.consumer().await?;

        // One message per request: a single item in flight per consumer
        let mut messages = consumer
            .fetch()
            .max_messages(1)
            .expires(self.config.poll_interval())
            .messages()
            .await
            .map_err(|e| QueueError::Consume(e.to_string()))?;

        let Some(next) = messages.next().await else {
            return Ok(None);
        };
        let message = next.map_err(|e| QueueError::Consume(e.to_string()))?;

        let attempt = match message.info() {
            Ok(info) => info.delivered.max(1) as u64,
            Err(e) => {
                warn!(error = %e, "Message without delivery metadata");
                1
            }
        };
        let payload = message.payload.clone();

        Ok(Some(Delivery::new(
            payload,
            attempt,
            Box::new(JetStreamAcker { message }),
        )))
    }
}

struct JetStreamAcker {
    message: jetstream::Message,
}

impl JetStreamAcker {
    async fn settle(&self, kind: AckKind) -> Result<(), QueueError> {
        self.message
            .ack_with(kind)
            .await
            .map_err(|e| QueueError::Ack(e.to_string()))
    }
}

#[async_trait]
impl Acknowledger for JetStreamAcker {
    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        self.settle(AckKind::Ack).await
    }

    async fn requeue(self: Box<Self>) -> Result<(), QueueError> {
        self.settle(AckKind::Nak(None)).await
    }

    async fn discard(self: Box<Self>) -> Result<(), QueueError> {
        self.settle(AckKind::Term).await
    }
}
