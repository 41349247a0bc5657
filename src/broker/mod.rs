// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Message broker seams
//!
//! The worker only needs three things from a broker: pull the next
//! delivery, settle it (ack or reject), and publish a response under a
//! routing key. [`AmqpBroker`] provides them over RabbitMQ; [`MemoryBroker`]
//! provides them in process for tests and local runs.

pub mod amqp;
pub mod errors;
pub mod memory;

pub use amqp::{AmqpBroker, AmqpConsumer, AmqpPublisher};
pub use errors::BrokerError;
pub use memory::{DeliveryState, MemoryBroker, MemoryConsumer, MemoryPublisher};

use async_trait::async_trait;

/// Settles one delivery with the broker
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;

    /// Rejects the delivery; with `requeue = false` it is dropped or
    /// dead-lettered by the broker
    async fn reject(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// One delivered message and the handle to settle it
pub struct InboundMessage {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub body: Vec<u8>,
    acker: Box<dyn Acknowledger>,
}

impl std::fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundMessage")
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

impl InboundMessage {
    pub fn new(
        delivery_tag: u64,
        redelivered: bool,
        body: Vec<u8>,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            delivery_tag,
            redelivered,
            body,
            acker,
        }
    }

    pub async fn ack(&self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    pub async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.acker.reject(requeue).await
    }
}

/// Source of deliveries, pulled one at a time
#[async_trait]
pub trait MessageSource: Send {
    /// Next delivery; `None` once the source is closed
    async fn next_message(&mut self) -> Option<Result<InboundMessage, BrokerError>>;
}

/// Publishes response payloads to the responses exchange
#[async_trait]
pub trait ResponsePublisher: Send + Sync {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), BrokerError>;
}
