// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! RabbitMQ adapter (lapin)
//!
//! One long-lived connection and one channel. The channel prefetches a
//! single message so that exactly one request is in flight at a time.
//! There is no reconnection: a closed connection ends the consumer stream
//! and the caller decides what to do.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::uri::{AMQPAuthority, AMQPScheme, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tracing::{debug, info};

use super::{Acknowledger, BrokerError, InboundMessage, MessageSource, ResponsePublisher};
use crate::config::{BrokerConfig, Topology};

/// Connected broker with the worker topology declared
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
    topology: Topology,
    consumer_tag: String,
}

impl AmqpBroker {
    /// Connects, opens a channel, declares the topology and sets prefetch 1
    pub async fn connect(config: &BrokerConfig, topology: Topology) -> Result<Self, BrokerError> {
        let target = config.display_target();
        info!("Connecting to RabbitMQ at {}", target);

        let connection = Connection::connect_uri(amqp_uri(config), connection_properties())
            .await
            .map_err(|e| BrokerError::ConnectionFailed {
                target: target.clone(),
                reason: e.to_string(),
            })?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::ConnectionFailed {
                target: target.clone(),
                reason: e.to_string(),
            })?;

        declare_topology(&channel, &topology).await?;

        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::DeclareFailed {
                what: "prefetch".to_string(),
                reason: e.to_string(),
            })?;

        info!("Connected to RabbitMQ at {}", target);

        Ok(Self {
            connection,
            channel,
            topology,
            consumer_tag: config.consumer_tag.clone(),
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Starts consuming the requests queue with manual acknowledgement
    pub async fn consumer(&self) -> Result<AmqpConsumer, BrokerError> {
        let consumer = self
            .channel
            .basic_consume(
                &self.topology.requests_queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        Ok(AmqpConsumer { consumer })
    }

    /// Publisher bound to the responses exchange
    pub fn publisher(&self) -> AmqpPublisher {
        AmqpPublisher {
            channel: self.channel.clone(),
            exchange: self.topology.responses_exchange.clone(),
        }
    }

    /// Closes the channel and the connection
    pub async fn close(self) -> Result<(), BrokerError> {
        let close_err = |e: lapin::Error| BrokerError::ConnectionFailed {
            target: "close".to_string(),
            reason: e.to_string(),
        };
        self.channel.close(200, "worker shutdown").await.map_err(close_err)?;
        self.connection.close(200, "worker shutdown").await.map_err(close_err)?;
        Ok(())
    }
}

/// Drives lapin's I/O and internal tasks on the current tokio runtime
fn connection_properties() -> ConnectionProperties {
    ConnectionProperties::default()
        .with_executor(tokio_executor_trait::Tokio::current())
        .with_reactor(tokio_reactor_trait::Tokio)
}

fn amqp_uri(config: &BrokerConfig) -> AMQPUri {
    AMQPUri {
        scheme: AMQPScheme::AMQP,
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: config.user.clone(),
                password: config.password.clone(),
            },
            host: config.host.clone(),
            port: config.port,
        },
        vhost: config.vhost.clone(),
        query: Default::default(),
    }
}

async fn declare_topology(channel: &Channel, topology: &Topology) -> Result<(), BrokerError> {
    let declare_err = |what: String| {
        move |e: lapin::Error| BrokerError::DeclareFailed {
            what,
            reason: e.to_string(),
        }
    };

    for exchange in [&topology.requests_exchange, &topology.responses_exchange] {
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(declare_err(format!("exchange {}", exchange)))?;
    }

    channel
        .queue_declare(
            &topology.requests_queue,
            QueueDeclareOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(declare_err(format!("queue {}", topology.requests_queue)))?;
    channel
        .queue_bind(
            &topology.requests_queue,
            &topology.requests_exchange,
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(declare_err(format!("binding {}", topology.requests_queue)))?;

    for (queue, routing_key) in &topology.response_bindings {
        channel
            .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .map_err(declare_err(format!("queue {}", queue)))?;
        channel
            .queue_bind(
                queue,
                &topology.responses_exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(declare_err(format!("binding {} -> {}", routing_key, queue)))?;
    }

    debug!("Declared topology {:?}", topology);
    Ok(())
}

/// Stream of deliveries from the requests queue
pub struct AmqpConsumer {
    consumer: Consumer,
}

#[async_trait]
impl MessageSource for AmqpConsumer {
    async fn next_message(&mut self) -> Option<Result<InboundMessage, BrokerError>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|delivery| {
                    let acker = AmqpAcker {
                        delivery_tag: delivery.delivery_tag,
                        acker: delivery.acker,
                    };
                    InboundMessage::new(
                        delivery.delivery_tag,
                        delivery.redelivered,
                        delivery.data,
                        Box::new(acker),
                    )
                })
                .map_err(|e| BrokerError::Consume(e.to_string())),
        )
    }
}

struct AmqpAcker {
    delivery_tag: u64,
    acker: Acker,
}

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::SettleFailed {
                delivery_tag: self.delivery_tag,
                reason: e.to_string(),
            })
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.acker
            .reject(BasicRejectOptions { requeue })
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::SettleFailed {
                delivery_tag: self.delivery_tag,
                reason: e.to_string(),
            })
    }
}

/// Publishes JSON responses on the responses exchange
#[derive(Clone)]
pub struct AmqpPublisher {
    channel: Channel,
    exchange: String,
}

#[async_trait]
impl ResponsePublisher for AmqpPublisher {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let publish_err = |e: lapin::Error| BrokerError::PublishFailed {
            exchange: self.exchange.clone(),
            routing_key: routing_key.to_string(),
            reason: e.to_string(),
        };

        self.channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(publish_err)?
            .await
            .map_err(publish_err)?;

        Ok(())
    }
}
