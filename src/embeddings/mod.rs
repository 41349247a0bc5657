// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding generation
//!
//! - [`OnnxEncoder`]: one ONNX transformer + tokenizer, text → hidden states
//! - [`ModelSet`]: the code and query encoders, loaded once per process
//! - [`ModelEmbedder`]: the pooling policy on top (chunked max-pooling or
//!   the legacy mean pooling)

pub mod chunker;
pub mod embedder;
pub mod errors;
pub mod model_manager;
pub mod onnx_model;
pub mod pooling;

pub use chunker::{ChunkConfig, SpecialTokens};
pub use embedder::ModelEmbedder;
pub use errors::EmbeddingError;
pub use model_manager::{ModelInfo, ModelSet};
pub use onnx_model::OnnxEncoder;

use async_trait::async_trait;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of content in a request; also the response routing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Code,
    Query,
}

impl RequestKind {
    pub const ALL: [RequestKind; 2] = [RequestKind::Code, RequestKind::Query];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Code => "code",
            RequestKind::Query => "query",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(RequestKind::Code),
            "query" => Ok(RequestKind::Query),
            other => Err(other.to_string()),
        }
    }
}

/// How hidden states become the published embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolingPolicy {
    /// First-position pooling, L2 normalized; code inputs are chunked and
    /// max-pooled across chunks
    #[default]
    Chunked,
    /// Mean over the truncated input, not normalized, same for every kind
    Mean,
}

impl FromStr for PoolingPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chunked" => Ok(PoolingPolicy::Chunked),
            "mean" => Ok(PoolingPolicy::Mean),
            other => Err(anyhow::anyhow!(
                "Unknown pooling policy '{}' (expected 'chunked' or 'mean')",
                other
            )),
        }
    }
}

/// A transformer that maps token ids to their last hidden state
///
/// Implementations must be deterministic for a given id sequence.
pub trait Encoder: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Hidden size (embedding dimensionality)
    fn hidden_size(&self) -> usize;

    /// Longest id sequence a single forward pass accepts, special tokens included
    fn max_tokens(&self) -> usize;

    /// Begin/end tokens used to frame every window
    fn special_tokens(&self) -> SpecialTokens;

    /// Tokenizes text without adding special tokens
    fn tokenize(&self, text: &str) -> Result<Vec<u32>, EmbeddingError>;

    /// Runs one forward pass over framed ids, returning `[ids.len(), hidden]`
    fn forward(&self, ids: &[u32]) -> Result<Array2<f32>, EmbeddingError>;
}

/// Converts request content into a fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, content: &str, kind: RequestKind) -> Result<Vec<f32>, EmbeddingError>;

    /// Length of the vectors produced for `kind`
    fn dimension(&self, kind: RequestKind) -> usize;
}
