// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Deterministic stand-in encoder shared by the integration suites

#![allow(dead_code)]

use embedify::embeddings::{Encoder, EmbeddingError, ModelEmbedder, ModelSet, PoolingPolicy, SpecialTokens};
use ndarray::Array2;
use std::sync::Arc;

pub const HIDDEN: usize = 64;
pub const BOS: u32 = 0;
pub const EOS: u32 = 2;

/// Word-hashing encoder
///
/// Each whitespace-separated word becomes one id. The first output row is a
/// bag of words over the window's content ids, so windows sharing words get
/// similar first-position vectors; the other rows are one-hot per id.
pub struct HashEncoder {
    pub max_tokens: usize,
}

impl Default for HashEncoder {
    fn default() -> Self {
        Self { max_tokens: 512 }
    }
}

pub fn word_id(word: &str) -> u32 {
    // FNV-1a
    let mut hash: u32 = 0x811c_9dc5;
    for byte in word.to_lowercase().bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    3 + hash % 50_000
}

impl Encoder for HashEncoder {
    fn name(&self) -> &str {
        "hash-encoder"
    }

    fn hidden_size(&self) -> usize {
        HIDDEN
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens { bos: BOS, eos: EOS }
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>, EmbeddingError> {
        Ok(text.split_whitespace().map(word_id).collect())
    }

    fn forward(&self, ids: &[u32]) -> Result<Array2<f32>, EmbeddingError> {
        if ids.len() > self.max_tokens {
            return Err(EmbeddingError::Inference(format!(
                "sequence of {} exceeds {}",
                ids.len(),
                self.max_tokens
            )));
        }

        let mut hidden = Array2::<f32>::zeros((ids.len(), HIDDEN));
        let content = ids.get(1..ids.len().saturating_sub(1)).unwrap_or(&[]);
        if !ids.is_empty() {
            hidden[[0, 0]] = 0.01;
            for id in content {
                hidden[[0, *id as usize % HIDDEN]] += 1.0;
            }
        }
        for (pos, id) in ids.iter().enumerate().skip(1) {
            hidden[[pos, *id as usize % HIDDEN]] = 1.0;
        }
        Ok(hidden)
    }
}

pub fn hash_embedder(policy: PoolingPolicy) -> ModelEmbedder {
    let models = ModelSet::shared(Arc::new(HashEncoder::default()));
    ModelEmbedder::new(Arc::new(models), policy)
}

/// `n` distinct words
pub fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
