// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Worker configuration
//!
//! Everything is read from the process environment (after an optional
//! `.env` file has been loaded by the binary). Each config struct has a
//! `Default` matching the documented defaults and a `from_lookup`
//! constructor so tests can feed variables without touching the real
//! environment.

pub mod broker;
pub mod models;

pub use broker::{
    BrokerConfig, Topology, CODE_RESPONSES_QUEUE, QUERY_RESPONSES_QUEUE, REQUESTS_EXCHANGE,
    REQUESTS_QUEUE, RESPONSES_EXCHANGE,
};
pub use models::{ModelPaths, ModelsConfig};

use anyhow::Result;

/// Complete configuration for the embedding worker process
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub broker: BrokerConfig,
    pub models: ModelsConfig,
}

impl WorkerConfig {
    /// Reads the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            broker: BrokerConfig::from_lookup(&lookup)?,
            models: ModelsConfig::from_lookup(&lookup)?,
        })
    }
}

/// Looks up `key` and treats empty or whitespace-only values as unset
pub(crate) fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
