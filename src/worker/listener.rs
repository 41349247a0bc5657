// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Queue listener
//!
//! Pulls one delivery at a time and carries it through
//! parse → embed → publish → ack before pulling the next. Invalid requests
//! are rejected without requeue. Embedding and publish failures leave the
//! delivery unsettled and stop the loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::request::{EmbeddingRequest, RequestError, RequestId};
use super::response::EmbeddingResponse;
use crate::broker::{BrokerError, InboundMessage, MessageSource, ResponsePublisher};
use crate::embeddings::{Embedder, EmbeddingError, RequestKind};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Failed to serialize response: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            WorkerError::Embedding(e) => e.error_code(),
            WorkerError::Broker(e) => e.error_code(),
            WorkerError::Serialization(_) => "SERIALIZATION_FAILED",
        }
    }
}

/// What happened to a single delivery
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Response published and delivery acknowledged
    Published {
        request_id: RequestId,
        kind: RequestKind,
        dimension: usize,
        elapsed_ms: u128,
    },
    /// Delivery rejected without requeue; nothing published
    Rejected(RequestError),
}

/// Why [`EmbeddingWorker::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The message source has no more deliveries (connection closed)
    SourceClosed,
    /// The shutdown future resolved
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: u64,
    pub rejected: u64,
    pub stop: StopReason,
}

/// Single-consumer embedding worker
pub struct EmbeddingWorker<E: ?Sized, P> {
    embedder: Arc<E>,
    publisher: P,
}

impl<E, P> EmbeddingWorker<E, P>
where
    E: Embedder + ?Sized,
    P: ResponsePublisher,
{
    pub fn new(embedder: Arc<E>, publisher: P) -> Self {
        Self {
            embedder,
            publisher,
        }
    }

    /// Processes one delivery end to end
    pub async fn handle(&self, message: &InboundMessage) -> Result<Outcome, WorkerError> {
        let summary = EmbeddingRequest::summarize(&message.body);
        info!(
            delivery_tag = message.delivery_tag,
            redelivered = message.redelivered,
            "Received request {} (type: {}, length: {})",
            summary.request_id.as_deref().unwrap_or("<none>"),
            summary.kind.as_deref().unwrap_or("<none>"),
            summary.content_len.unwrap_or(0)
        );

        let request = match EmbeddingRequest::parse(&message.body) {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    delivery_tag = message.delivery_tag,
                    code = e.error_code(),
                    "Rejecting request: {}",
                    e
                );
                message.reject(false).await?;
                return Ok(Outcome::Rejected(e));
            }
        };

        let started = Instant::now();
        let embedding = self
            .embedder
            .embed(&request.content, request.kind)
            .await?;
        let elapsed_ms = started.elapsed().as_millis();
        let dimension = embedding.len();

        let routing_key = request.kind.as_str();
        let payload = EmbeddingResponse::new(request.request_id.clone(), embedding).to_json()?;
        self.publisher.publish(routing_key, &payload).await?;
        message.ack().await?;

        info!(
            "Request {} embedified in {} ms ({}D, routed to '{}')",
            request.request_id, elapsed_ms, dimension, routing_key
        );

        Ok(Outcome::Published {
            request_id: request.request_id,
            kind: request.kind,
            dimension,
            elapsed_ms,
        })
    }

    /// Consumes `source` until it closes, errors, or `shutdown` resolves
    ///
    /// Shutdown is only observed between deliveries; a message that has
    /// been pulled is always carried to completion or failure.
    pub async fn run<S, F>(&self, source: &mut S, shutdown: F) -> Result<RunSummary, WorkerError>
    where
        S: MessageSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut processed = 0u64;
        let mut rejected = 0u64;

        let stop = loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => break StopReason::Shutdown,
                next = source.next_message() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    error!("Consumer failed: {}", e);
                    return Err(e.into());
                }
                None => break StopReason::SourceClosed,
            };

            match self.handle(&message).await {
                Ok(Outcome::Published { .. }) => processed += 1,
                Ok(Outcome::Rejected(_)) => rejected += 1,
                Err(e) => {
                    error!(
                        delivery_tag = message.delivery_tag,
                        code = e.error_code(),
                        "Failed to process delivery, leaving it unacknowledged: {}",
                        e
                    );
                    return Err(e);
                }
            }
        };

        debug!(
            "Worker loop stopped ({:?}) after {} processed, {} rejected",
            stop, processed, rejected
        );

        Ok(RunSummary {
            processed,
            rejected,
            stop,
        })
    }
}
