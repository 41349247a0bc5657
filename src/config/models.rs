// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding model locations and pooling policy

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use super::non_empty;
use crate::embeddings::PoolingPolicy;

pub const DEFAULT_CODE_MODEL_PATH: &str = "./models/codebert-base-onnx/model.onnx";
pub const DEFAULT_CODE_TOKENIZER_PATH: &str = "./models/codebert-base-onnx/tokenizer.json";

/// On-disk location of one ONNX model and its tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Display name used in logs (derived from the model directory)
    pub name: String,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl ModelPaths {
    pub fn new(model_path: impl Into<PathBuf>, tokenizer_path: impl Into<PathBuf>) -> Self {
        let model_path = model_path.into();
        let tokenizer_path = tokenizer_path.into();
        let name = model_path
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty() && n != ".")
            .unwrap_or_else(|| "model".to_string());

        Self {
            name,
            model_path,
            tokenizer_path,
        }
    }
}

/// Which models to load and how to pool their outputs
///
/// Environment:
/// - `CODE_MODEL_PATH` / `CODE_TOKENIZER_PATH`
/// - `QUERY_MODEL_PATH` / `QUERY_TOKENIZER_PATH` (both or neither; unset
///   means queries reuse the code model)
/// - `EMBEDIFY_POOLING` (`chunked` or `mean`)
/// - `EMBEDIFY_CODE_MAX_TOKENS` (optional cap on code input tokens)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelsConfig {
    pub code: ModelPaths,
    pub query: Option<ModelPaths>,
    pub pooling: PoolingPolicy,
    pub code_max_tokens: Option<usize>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            code: ModelPaths::new(DEFAULT_CODE_MODEL_PATH, DEFAULT_CODE_TOKENIZER_PATH),
            query: None,
            pooling: PoolingPolicy::default(),
            code_max_tokens: None,
        }
    }
}

impl ModelsConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let code = ModelPaths::new(
            non_empty(lookup, "CODE_MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_CODE_MODEL_PATH.to_string()),
            non_empty(lookup, "CODE_TOKENIZER_PATH")
                .unwrap_or_else(|| DEFAULT_CODE_TOKENIZER_PATH.to_string()),
        );

        let query = match (
            non_empty(lookup, "QUERY_MODEL_PATH"),
            non_empty(lookup, "QUERY_TOKENIZER_PATH"),
        ) {
            (Some(model), Some(tokenizer)) => Some(ModelPaths::new(model, tokenizer)),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "QUERY_MODEL_PATH and QUERY_TOKENIZER_PATH must be set together"
                ))
            }
        };

        let pooling = match non_empty(lookup, "EMBEDIFY_POOLING") {
            Some(raw) => raw.parse::<PoolingPolicy>()?,
            None => PoolingPolicy::default(),
        };

        let code_max_tokens = match non_empty(lookup, "EMBEDIFY_CODE_MAX_TOKENS") {
            Some(raw) => {
                let value = raw
                    .parse::<usize>()
                    .with_context(|| format!("Invalid EMBEDIFY_CODE_MAX_TOKENS: {}", raw))?;
                (value > 0).then_some(value)
            }
            None => None,
        };

        Ok(Self {
            code,
            query,
            pooling,
            code_max_tokens,
        })
    }
}
