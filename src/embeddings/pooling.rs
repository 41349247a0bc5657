// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Pooling and normalization over transformer hidden states
//!
//! All functions operate on a single sequence's last hidden state laid out
//! as `[seq_len, hidden]`.

use ndarray::{Array2, ArrayView2, Axis};

use super::EmbeddingError;

/// Euclidean length of a vector
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|&x| x * x).sum::<f32>().sqrt()
}

/// Scales a vector to unit length in place
///
/// Zero and non-finite norms leave the vector untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm == 0.0 || !norm.is_finite() {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

/// Returns a unit-length copy of `vector`
pub fn normalized(vector: &[f32]) -> Vec<f32> {
    let mut out = vector.to_vec();
    l2_normalize(&mut out);
    out
}

/// Hidden state of the first position (the `<s>` / `[CLS]` token)
pub fn first_position(hidden: ArrayView2<'_, f32>) -> Result<Vec<f32>, EmbeddingError> {
    if hidden.nrows() == 0 {
        return Err(EmbeddingError::OutputShape(
            "hidden state has no positions".to_string(),
        ));
    }
    Ok(hidden.index_axis(Axis(0), 0).to_vec())
}

/// Attention-mask-weighted mean over all positions
///
/// Without padding every position carries mask 1, so this is a plain mean.
pub fn mean_pool(hidden: ArrayView2<'_, f32>, attention_mask: &[i64]) -> Result<Vec<f32>, EmbeddingError> {
    let (seq_len, hidden_dim) = hidden.dim();
    if seq_len == 0 {
        return Err(EmbeddingError::OutputShape(
            "hidden state has no positions".to_string(),
        ));
    }
    if attention_mask.len() != seq_len {
        return Err(EmbeddingError::OutputShape(format!(
            "attention mask has {} entries for {} positions",
            attention_mask.len(),
            seq_len
        )));
    }

    let mut pooled = vec![0.0f32; hidden_dim];
    let mut sum_mask = 0.0f32;

    for (i, row) in hidden.outer_iter().enumerate() {
        let mask_value = attention_mask[i] as f32;
        sum_mask += mask_value;
        for (acc, &v) in pooled.iter_mut().zip(row.iter()) {
            *acc += v * mask_value;
        }
    }

    for val in &mut pooled {
        *val /= sum_mask.max(1e-9);
    }

    Ok(pooled)
}

/// Element-wise maximum across a set of equally sized vectors
pub fn elementwise_max(vectors: &[Vec<f32>]) -> Result<Vec<f32>, EmbeddingError> {
    let first = vectors.first().ok_or_else(|| {
        EmbeddingError::InvalidChunking("no chunk embeddings to combine".to_string())
    })?;

    let mut combined = first.clone();
    for vector in &vectors[1..] {
        if vector.len() != combined.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: combined.len(),
                actual: vector.len(),
            });
        }
        for (acc, &v) in combined.iter_mut().zip(vector.iter()) {
            if v > *acc {
                *acc = v;
            }
        }
    }

    Ok(combined)
}

/// Merges per-chunk embeddings into one unit vector
///
/// Each chunk is expected to be normalized already; the element-wise
/// maximum is renormalized once more.
pub fn combine_chunks(chunk_embeddings: &[Vec<f32>]) -> Result<Vec<f32>, EmbeddingError> {
    let mut combined = elementwise_max(chunk_embeddings)?;
    l2_normalize(&mut combined);
    Ok(combined)
}

/// Stacks vectors into a `[n, dim]` matrix
pub fn stack(vectors: &[Vec<f32>]) -> Result<Array2<f32>, EmbeddingError> {
    let dim = vectors.first().map(|v| v.len()).unwrap_or(0);
    let mut flat = Vec::with_capacity(vectors.len() * dim);
    for vector in vectors {
        if vector.len() != dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dim,
                actual: vector.len(),
            });
        }
        flat.extend_from_slice(vector);
    }
    Array2::from_shape_vec((vectors.len(), dim), flat)
        .map_err(|e| EmbeddingError::OutputShape(e.to_string()))
}
