// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! In-process broker
//!
//! Models direct exchanges, bindings and queues closely enough to drive the
//! worker end to end without RabbitMQ. Settlement is tracked per delivery
//! tag so tests can assert exactly how every message was handled.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Acknowledger, BrokerError, InboundMessage, MessageSource, ResponsePublisher};
use crate::config::Topology;

/// How a delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Unacked,
    Acked,
    Rejected { requeue: bool },
}

#[derive(Debug, Clone)]
struct QueuedMessage {
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct State {
    /// exchange -> (routing key, queue)
    bindings: HashMap<String, Vec<(String, String)>>,
    queues: HashMap<String, VecDeque<QueuedMessage>>,
    deliveries: HashMap<u64, (String, Vec<u8>, DeliveryState)>,
    next_tag: u64,
}

/// Shared in-memory broker; clones refer to the same state
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker with every exchange, queue and binding of `topology` declared
    pub async fn with_topology(topology: &Topology) -> Self {
        let broker = Self::new();
        broker
            .bind(&topology.requests_queue, &topology.requests_exchange, "")
            .await;
        for (queue, key) in &topology.response_bindings {
            broker.bind(queue, &topology.responses_exchange, key).await;
        }
        broker
    }

    /// Declares `queue` and binds it to `exchange` under `routing_key`
    pub async fn bind(&self, queue: &str, exchange: &str, routing_key: &str) {
        let mut state = self.state.lock().await;
        state.queues.entry(queue.to_string()).or_default();
        state
            .bindings
            .entry(exchange.to_string())
            .or_default()
            .push((routing_key.to_string(), queue.to_string()));
    }

    /// Routes `payload` to every queue bound under `routing_key`
    ///
    /// Returns the number of queues the message landed in; unroutable
    /// messages are dropped like on a real direct exchange.
    pub async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> usize {
        let mut state = self.state.lock().await;
        let targets: Vec<String> = state
            .bindings
            .get(exchange)
            .map(|bindings| {
                bindings
                    .iter()
                    .filter(|(key, _)| key == routing_key)
                    .map(|(_, queue)| queue.clone())
                    .collect()
            })
            .unwrap_or_default();

        for queue in &targets {
            state
                .queues
                .entry(queue.clone())
                .or_default()
                .push_back(QueuedMessage {
                    body: payload.to_vec(),
                    redelivered: false,
                });
        }

        debug!(
            "Routed message on {}/{} to {} queue(s)",
            exchange,
            routing_key,
            targets.len()
        );
        targets.len()
    }

    /// Consumer over `queue`; the stream ends once the queue is empty
    pub fn consumer(&self, queue: &str) -> MemoryConsumer {
        MemoryConsumer {
            broker: self.clone(),
            queue: queue.to_string(),
        }
    }

    /// Publisher onto `exchange`
    pub fn publisher(&self, exchange: &str) -> MemoryPublisher {
        MemoryPublisher {
            broker: self.clone(),
            exchange: exchange.to_string(),
        }
    }

    /// Removes and returns every message waiting in `queue`
    pub async fn drain(&self, queue: &str) -> Vec<Vec<u8>> {
        let mut state = self.state.lock().await;
        state
            .queues
            .get_mut(queue)
            .map(|messages| messages.drain(..).map(|m| m.body).collect())
            .unwrap_or_default()
    }

    pub async fn queue_len(&self, queue: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue).map(VecDeque::len).unwrap_or(0)
    }

    /// Settlement state of every delivery, ordered by delivery tag
    pub async fn delivery_states(&self) -> Vec<(u64, DeliveryState)> {
        let state = self.state.lock().await;
        let mut states: Vec<(u64, DeliveryState)> = state
            .deliveries
            .iter()
            .map(|(tag, (_, _, delivery))| (*tag, *delivery))
            .collect();
        states.sort_by_key(|(tag, _)| *tag);
        states
    }

    async fn deliver(&self, queue: &str) -> Option<InboundMessage> {
        let mut state = self.state.lock().await;
        let message = state.queues.get_mut(queue)?.pop_front()?;

        state.next_tag += 1;
        let tag = state.next_tag;
        state.deliveries.insert(
            tag,
            (queue.to_string(), message.body.clone(), DeliveryState::Unacked),
        );

        let acker = MemoryAcker {
            broker: self.clone(),
            delivery_tag: tag,
        };
        Some(InboundMessage::new(
            tag,
            message.redelivered,
            message.body,
            Box::new(acker),
        ))
    }

    async fn settle(&self, delivery_tag: u64, outcome: DeliveryState) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let (queue, body) = match state.deliveries.get_mut(&delivery_tag) {
            Some((queue, body, current)) if *current == DeliveryState::Unacked => {
                *current = outcome;
                (queue.clone(), body.clone())
            }
            _ => return Err(BrokerError::AlreadySettled(delivery_tag)),
        };

        if outcome == (DeliveryState::Rejected { requeue: true }) {
            state
                .queues
                .entry(queue)
                .or_default()
                .push_back(QueuedMessage {
                    body,
                    redelivered: true,
                });
        }
        Ok(())
    }
}

struct MemoryAcker {
    broker: MemoryBroker,
    delivery_tag: u64,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.broker
            .settle(self.delivery_tag, DeliveryState::Acked)
            .await
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.broker
            .settle(self.delivery_tag, DeliveryState::Rejected { requeue })
            .await
    }
}

pub struct MemoryConsumer {
    broker: MemoryBroker,
    queue: String,
}

#[async_trait]
impl MessageSource for MemoryConsumer {
    async fn next_message(&mut self) -> Option<Result<InboundMessage, BrokerError>> {
        self.broker.deliver(&self.queue).await.map(Ok)
    }
}

#[derive(Clone)]
pub struct MemoryPublisher {
    broker: MemoryBroker,
    exchange: String,
}

#[async_trait]
impl ResponsePublisher for MemoryPublisher {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.broker
            .publish(&self.exchange, routing_key, payload)
            .await;
        Ok(())
    }
}
