// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Vector search over embeddings

pub mod errors;
pub mod hnsw;
pub mod similarity;

pub use errors::IndexError;
pub use hnsw::{HnswIndex, IndexEntry, SearchHit};
pub use similarity::{cosine_similarity, rank, similarity_matrix};
