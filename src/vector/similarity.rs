// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Exact cosine similarity helpers for small corpora

use ndarray::Array2;

use crate::embeddings::pooling::{normalized, stack};
use crate::embeddings::EmbeddingError;

/// Cosine similarity; 0.0 when either vector has zero length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Pairwise cosine similarities, `[n, n]`
pub fn similarity_matrix(vectors: &[Vec<f32>]) -> Result<Array2<f32>, EmbeddingError> {
    let units: Vec<Vec<f32>> = vectors.iter().map(|v| normalized(v)).collect();
    let matrix = stack(&units)?;
    Ok(matrix.dot(&matrix.t()))
}

/// Corpus indices ranked by similarity to `query`, best first
pub fn rank(query: &[f32], corpus: &[Vec<f32>]) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = corpus
        .iter()
        .enumerate()
        .map(|(i, v)| (i, cosine_similarity(query, v)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}
