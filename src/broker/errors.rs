// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the message broker adapters

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    /// Could not open the connection or channel
    #[error("Failed to connect to broker at {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    /// Exchange, queue or binding declaration failed
    #[error("Failed to declare {what}: {reason}")]
    DeclareFailed { what: String, reason: String },

    /// Publish was refused or not confirmed
    #[error("Failed to publish to {exchange}/{routing_key}: {reason}")]
    PublishFailed {
        exchange: String,
        routing_key: String,
        reason: String,
    },

    /// Ack / reject for a delivery failed
    #[error("Failed to settle delivery {delivery_tag}: {reason}")]
    SettleFailed { delivery_tag: u64, reason: String },

    /// Consumer stream returned an error
    #[error("Consumer error: {0}")]
    Consume(String),

    /// The same delivery was settled twice
    #[error("Delivery {0} was already settled")]
    AlreadySettled(u64),
}

impl BrokerError {
    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            BrokerError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            BrokerError::DeclareFailed { .. } => "DECLARE_FAILED",
            BrokerError::PublishFailed { .. } => "PUBLISH_FAILED",
            BrokerError::SettleFailed { .. } => "SETTLE_FAILED",
            BrokerError::Consume(_) => "CONSUME_FAILED",
            BrokerError::AlreadySettled(_) => "ALREADY_SETTLED",
        }
    }
}
