// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding Model Set
//!
//! Loads the code encoder and the optional query encoder once at start-up
//! and hands out shared read-only handles. When no query model is
//! configured, queries are encoded by the code model so that query and code
//! vectors live in the same space.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use super::{Encoder, OnnxEncoder, RequestKind};
use crate::config::{ModelPaths, ModelsConfig};

/// Information about a loaded model
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub dimensions: usize,
    pub max_tokens: usize,
    /// Request kinds served by this model
    pub kinds: Vec<RequestKind>,
}

/// The encoders used by the worker, one per request kind
///
/// # Example
/// ```ignore
/// let models = ModelSet::load(&ModelsConfig::from_env()?).await?;
/// let encoder = models.encoder_for(RequestKind::Code);
/// ```
#[derive(Clone)]
pub struct ModelSet {
    code: Arc<dyn Encoder>,
    query: Arc<dyn Encoder>,
    shared: bool,
}

impl std::fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSet")
            .field("code", &self.code.name())
            .field("query", &self.query.name())
            .field("shared", &self.shared)
            .finish()
    }
}

impl ModelSet {
    /// Loads the configured models
    ///
    /// Both models load in parallel on the blocking pool. Any failure is
    /// fatal: the worker cannot serve a kind without its model.
    pub async fn load(config: &ModelsConfig) -> Result<Self> {
        let code_task = spawn_load(config.code.clone());
        let query_task = config.query.clone().map(spawn_load);

        let code = code_task.await.context("Code model loading task failed")??;
        let code: Arc<dyn Encoder> = Arc::new(code);

        let set = match query_task {
            Some(task) => {
                let query = task.await.context("Query model loading task failed")??;
                Self::separate(code, Arc::new(query))
            }
            None => Self::shared(code),
        };

        for model in set.list_models() {
            info!(
                "Embedding model ready: {} ({}D, max {} tokens) for {:?}",
                model.name, model.dimensions, model.max_tokens, model.kinds
            );
        }

        Ok(set)
    }

    /// One encoder serving both kinds
    pub fn shared(encoder: Arc<dyn Encoder>) -> Self {
        Self {
            code: encoder.clone(),
            query: encoder,
            shared: true,
        }
    }

    /// Distinct encoders for code and queries
    pub fn separate(code: Arc<dyn Encoder>, query: Arc<dyn Encoder>) -> Self {
        Self {
            code,
            query,
            shared: false,
        }
    }

    pub fn encoder_for(&self, kind: RequestKind) -> &Arc<dyn Encoder> {
        match kind {
            RequestKind::Code => &self.code,
            RequestKind::Query => &self.query,
        }
    }

    /// Lists the loaded models
    pub fn list_models(&self) -> Vec<ModelInfo> {
        let describe = |encoder: &Arc<dyn Encoder>, kinds: Vec<RequestKind>| ModelInfo {
            name: encoder.name().to_string(),
            dimensions: encoder.hidden_size(),
            max_tokens: encoder.max_tokens(),
            kinds,
        };

        if self.shared {
            vec![describe(&self.code, RequestKind::ALL.to_vec())]
        } else {
            vec![
                describe(&self.code, vec![RequestKind::Code]),
                describe(&self.query, vec![RequestKind::Query]),
            ]
        }
    }

    pub fn model_count(&self) -> usize {
        if self.shared {
            1
        } else {
            2
        }
    }
}

fn spawn_load(paths: ModelPaths) -> tokio::task::JoinHandle<Result<OnnxEncoder>> {
    tokio::task::spawn_blocking(move || {
        info!("Loading embedding model: {}", paths.name);
        OnnxEncoder::load(paths.name.clone(), &paths.model_path, &paths.tokenizer_path).map_err(
            |e| {
                error!("Failed to load model {}: {}", paths.name, e);
                e
            },
        )
    })
}
