// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! RabbitMQ connection settings and queue topology

use anyhow::{Context, Result};

use super::non_empty;

/// Exchange and queue that carry embedding requests
pub const REQUESTS_EXCHANGE: &str = "embeddings_requests";
pub const REQUESTS_QUEUE: &str = "embeddings_requests";

/// Exchange and per-kind queues that carry embedding responses
pub const RESPONSES_EXCHANGE: &str = "embeddings_responses";
pub const CODE_RESPONSES_QUEUE: &str = "code_embedding_responses";
pub const QUERY_RESPONSES_QUEUE: &str = "query_embedding_responses";

/// Default consumer tag announced to the broker
pub const DEFAULT_CONSUMER_TAG: &str = "embedify";

/// Broker connection parameters
///
/// Mirrors the `RABBITMQ_*` environment variables:
/// - `RABBITMQ_HOST` (default `localhost`)
/// - `RABBITMQ_PORT` (default `5672`)
/// - `RABBITMQ_USER` / `RABBITMQ_PASS` (default `guest` / `guest`)
/// - `RABBITMQ_VHOST` (default `/`)
#[derive(Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub consumer_tag: String,
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("vhost", &self.vhost)
            .field("consumer_tag", &self.consumer_tag)
            .finish_non_exhaustive()
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            consumer_tag: DEFAULT_CONSUMER_TAG.to_string(),
        }
    }
}

impl BrokerConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match non_empty(lookup, "RABBITMQ_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid RABBITMQ_PORT: {}", raw))?,
            None => defaults.port,
        };

        Ok(Self {
            host: non_empty(lookup, "RABBITMQ_HOST").unwrap_or(defaults.host),
            port,
            user: non_empty(lookup, "RABBITMQ_USER").unwrap_or(defaults.user),
            password: lookup("RABBITMQ_PASS").unwrap_or(defaults.password),
            vhost: non_empty(lookup, "RABBITMQ_VHOST").unwrap_or(defaults.vhost),
            consumer_tag: non_empty(lookup, "EMBEDIFY_CONSUMER_TAG")
                .unwrap_or(defaults.consumer_tag),
        })
    }

    /// Connection target without credentials, for logging
    pub fn display_target(&self) -> String {
        format!("{}:{}{}", self.host, self.port, display_vhost(&self.vhost))
    }
}

fn display_vhost(vhost: &str) -> String {
    if vhost.starts_with('/') {
        vhost.to_string()
    } else {
        format!("/{}", vhost)
    }
}

/// Names of every exchange, queue and binding the worker declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub requests_exchange: String,
    pub requests_queue: String,
    pub responses_exchange: String,
    /// (queue, routing key) pairs bound to the responses exchange
    pub response_bindings: Vec<(String, String)>,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            requests_exchange: REQUESTS_EXCHANGE.to_string(),
            requests_queue: REQUESTS_QUEUE.to_string(),
            responses_exchange: RESPONSES_EXCHANGE.to_string(),
            response_bindings: vec![
                (CODE_RESPONSES_QUEUE.to_string(), "code".to_string()),
                (QUERY_RESPONSES_QUEUE.to_string(), "query".to_string()),
            ],
        }
    }
}

impl Topology {
    /// Queue that receives responses published with `routing_key`
    pub fn response_queue_for(&self, routing_key: &str) -> Option<&str> {
        self.response_bindings
            .iter()
            .find(|(_, key)| key == routing_key)
            .map(|(queue, _)| queue.as_str())
    }
}
