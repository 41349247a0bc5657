// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Pooling policies on top of the loaded encoders
//!
//! Chunked policy:
//! - `query`: first 126 content tokens (128 framed), first-position
//!   pooling, L2 normalized
//! - `code`: 512-token windows overlapping by 50, first-position pooling
//!   per window, each window normalized, element-wise max across windows,
//!   normalized again
//!
//! Mean policy: one window truncated to the model limit, mean over all
//! positions, no normalization.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::chunker::{self, ChunkConfig, QUERY_MAX_TOKENS};
use super::pooling;
use super::{Embedder, EmbeddingError, Encoder, ModelSet, PoolingPolicy, RequestKind};

/// Embedder backed by a [`ModelSet`]
#[derive(Clone)]
pub struct ModelEmbedder {
    models: Arc<ModelSet>,
    policy: PoolingPolicy,
    chunking: ChunkConfig,
    /// Optional cap on code content tokens before chunking
    code_max_tokens: Option<usize>,
}

impl std::fmt::Debug for ModelEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEmbedder")
            .field("models", &self.models)
            .field("policy", &self.policy)
            .field("chunking", &self.chunking)
            .field("code_max_tokens", &self.code_max_tokens)
            .finish()
    }
}

impl ModelEmbedder {
    pub fn new(models: Arc<ModelSet>, policy: PoolingPolicy) -> Self {
        Self {
            models,
            policy,
            chunking: ChunkConfig::default(),
            code_max_tokens: None,
        }
    }

    pub fn with_code_max_tokens(mut self, limit: Option<usize>) -> Self {
        self.code_max_tokens = limit;
        self
    }

    pub fn policy(&self) -> PoolingPolicy {
        self.policy
    }

    /// Synchronous embedding; runs the forward passes on the calling thread
    pub fn embed_blocking(&self, content: &str, kind: RequestKind) -> Result<Vec<f32>, EmbeddingError> {
        let encoder = self.models.encoder_for(kind);
        match (self.policy, kind) {
            (PoolingPolicy::Mean, _) => embed_mean(encoder.as_ref(), content),
            (PoolingPolicy::Chunked, RequestKind::Query) => embed_query(encoder.as_ref(), content),
            (PoolingPolicy::Chunked, RequestKind::Code) => {
                embed_code(encoder.as_ref(), content, &self.chunking, self.code_max_tokens)
            }
        }
    }

    /// Embeds several texts of the same kind one after another
    pub fn embed_batch_blocking(
        &self,
        texts: &[String],
        kind: RequestKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts
            .iter()
            .map(|text| self.embed_blocking(text, kind))
            .collect()
    }
}

#[async_trait]
impl Embedder for ModelEmbedder {
    async fn embed(&self, content: &str, kind: RequestKind) -> Result<Vec<f32>, EmbeddingError> {
        let this = self.clone();
        let content = content.to_string();
        tokio::task::spawn_blocking(move || this.embed_blocking(&content, kind))
            .await
            .map_err(|e| EmbeddingError::TaskFailed(e.to_string()))?
    }

    fn dimension(&self, kind: RequestKind) -> usize {
        self.models.encoder_for(kind).hidden_size()
    }
}

fn embed_query(encoder: &dyn Encoder, content: &str) -> Result<Vec<f32>, EmbeddingError> {
    let ids = encoder.tokenize(content)?;
    let limit = QUERY_MAX_TOKENS.min(encoder.max_tokens());
    let window = chunker::truncate_ids(&ids, limit);

    let hidden = encoder.forward(&encoder.special_tokens().frame(window))?;
    let mut embedding = pooling::first_position(hidden.view())?;
    pooling::l2_normalize(&mut embedding);
    Ok(embedding)
}

fn embed_code(
    encoder: &dyn Encoder,
    content: &str,
    chunking: &ChunkConfig,
    code_max_tokens: Option<usize>,
) -> Result<Vec<f32>, EmbeddingError> {
    let mut ids = encoder.tokenize(content)?;
    if let Some(limit) = code_max_tokens {
        ids.truncate(limit);
    }

    let config = chunking.capped_at(encoder.max_tokens());
    let windows = chunker::chunk_token_ids(&ids, &config)?;
    debug!(
        "{}: {} content tokens in {} chunk(s)",
        encoder.name(),
        ids.len(),
        windows.len()
    );

    let special = encoder.special_tokens();
    let chunk_embeddings = windows
        .iter()
        .map(|window| {
            let hidden = encoder.forward(&special.frame(window))?;
            let mut embedding = pooling::first_position(hidden.view())?;
            pooling::l2_normalize(&mut embedding);
            Ok(embedding)
        })
        .collect::<Result<Vec<_>, EmbeddingError>>()?;

    pooling::combine_chunks(&chunk_embeddings)
}

fn embed_mean(encoder: &dyn Encoder, content: &str) -> Result<Vec<f32>, EmbeddingError> {
    let ids = encoder.tokenize(content)?;
    let window = chunker::truncate_ids(&ids, encoder.max_tokens());
    let framed = encoder.special_tokens().frame(window);

    let hidden = encoder.forward(&framed)?;
    let attention_mask = vec![1i64; framed.len()];
    pooling::mean_pool(hidden.view(), &attention_mask)
}
