// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HNSW Index for sentence search
//!
//! Approximate nearest neighbour search over cosine similarity, with
//! incremental insert, update and delete.
//!
//! `hnsw_rs` has no removal, so deletes are tombstones: the graph point
//! stays, its internal id is unmapped, and searches over-fetch by the
//! number of tombstones before filtering them out. Once tombstones
//! outnumber live entries the graph is rebuilt from the live entries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use embedify::vector::HnswIndex;
//!
//! let mut index = HnswIndex::new(768);
//! index.insert("s1", embedding, serde_json::json!({"sentence": "sort an array"}))?;
//! let hits = index.search(&query, 5, 0.0)?;
//! ```

use hnsw_rs::hnsw::{Hnsw, Neighbour};
use hnsw_rs::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::IndexError;
use crate::embeddings::pooling::normalized;

/// Search result from the index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,

    /// Cosine similarity to the query
    pub score: f32,

    pub metadata: Value,
}

/// Stored vector and its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub metadata: Value,
    internal_id: usize,
}

// Connections per layer and ef during construction
const MAX_NB_CONNECTION: usize = 12;
const EF_CONSTRUCTION: usize = 48;
const NB_LAYER: usize = 16;
const INITIAL_CAPACITY: usize = 10_000;

pub struct HnswIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    entries: HashMap<String, IndexEntry>,
    /// Live internal ids only; tombstoned ids are removed
    ids_by_internal: HashMap<usize, String>,
    next_internal_id: usize,
    tombstones: usize,
    dimensions: usize,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswIndex")
            .field("len", &self.entries.len())
            .field("tombstones", &self.tombstones)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl HnswIndex {
    pub fn new(dimensions: usize) -> Self {
        Self::with_capacity(dimensions, INITIAL_CAPACITY)
    }

    /// Empty index sized for roughly `capacity` vectors
    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            hnsw: new_graph(capacity),
            entries: HashMap::new(),
            ids_by_internal: HashMap::new(),
            next_internal_id: 0,
            tombstones: 0,
            dimensions,
        }
    }

    /// Builds an index from `(id, vector, metadata)` triples
    ///
    /// # Errors
    ///
    /// Fails on the first vector with wrong dimensions, non-finite values
    /// or a repeated id.
    pub fn build<I>(items: I, dimensions: usize) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = (String, Vec<f32>, Value)>,
    {
        let items: Vec<_> = items.into_iter().collect();
        let mut index = Self::with_capacity(dimensions, items.len().max(INITIAL_CAPACITY));
        for (id, vector, metadata) in items {
            index.insert(id, vector, metadata)?;
        }
        Ok(index)
    }

    pub fn insert(
        &mut self,
        id: impl Into<String>,
        vector: Vec<f32>,
        metadata: Value,
    ) -> Result<(), IndexError> {
        let id = id.into();
        self.validate(&vector)?;
        if self.entries.contains_key(&id) {
            return Err(IndexError::DuplicateId(id));
        }

        let internal_id = self.next_internal_id;
        self.next_internal_id += 1;

        let unit = normalized(&vector);
        self.hnsw.insert((unit.as_slice(), internal_id));

        self.ids_by_internal.insert(internal_id, id.clone());
        self.entries.insert(
            id,
            IndexEntry {
                vector,
                metadata,
                internal_id,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// Replaces the vector and metadata stored under `id`
    pub fn update(&mut self, id: &str, vector: Vec<f32>, metadata: Value) -> Result<(), IndexError> {
        self.validate(&vector)?;
        if !self.delete(id) {
            return Err(IndexError::NotFound(id.to_string()));
        }
        self.insert(id, vector, metadata)
    }

    /// Removes `id`; returns whether it was present
    pub fn delete(&mut self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some(entry) => {
                self.ids_by_internal.remove(&entry.internal_id);
                self.tombstones += 1;
                if self.tombstones > self.entries.len() {
                    self.compact();
                }
                true
            }
            None => false,
        }
    }

    /// Up to `k` live entries with similarity >= `threshold`, best first
    pub fn search(&self, query: &[f32], k: usize, threshold: f32) -> Result<Vec<SearchHit>, IndexError> {
        self.validate(query)?;
        if self.entries.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let fetch = (k + self.tombstones).min(self.next_internal_id);
        let ef_search = (fetch * 2).max(50);
        let neighbours: Vec<Neighbour> = self.hnsw.search(&normalized(query), fetch, ef_search);

        let mut hits: Vec<SearchHit> = neighbours
            .into_iter()
            .filter_map(|neighbour| {
                let id = self.ids_by_internal.get(&neighbour.d_id)?;
                let score = 1.0 - neighbour.distance;
                if score < threshold {
                    return None;
                }
                let metadata = self
                    .entries
                    .get(id)
                    .map(|e| e.metadata.clone())
                    .unwrap_or(Value::Null);
                Some(SearchHit {
                    id: id.clone(),
                    score,
                    metadata,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Rebuilds the graph from live entries, dropping every tombstone
    fn compact(&mut self) {
        let hnsw = new_graph(self.entries.len().max(INITIAL_CAPACITY));
        let mut ids_by_internal = HashMap::with_capacity(self.entries.len());

        for (internal_id, (id, entry)) in self.entries.iter_mut().enumerate() {
            let unit = normalized(&entry.vector);
            hnsw.insert((unit.as_slice(), internal_id));
            entry.internal_id = internal_id;
            ids_by_internal.insert(internal_id, id.clone());
        }

        debug!(
            "Compacted HNSW index: dropped {} tombstones, {} live entries",
            self.tombstones,
            self.entries.len()
        );
        self.hnsw = hnsw;
        self.next_internal_id = ids_by_internal.len();
        self.ids_by_internal = ids_by_internal;
        self.tombstones = 0;
    }

    fn validate(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::NonFinite);
        }
        Ok(())
    }
}

fn new_graph(capacity: usize) -> Hnsw<'static, f32, DistCosine> {
    Hnsw::new(
        MAX_NB_CONNECTION,
        capacity.max(1),
        NB_LAYER,
        EF_CONSTRUCTION,
        DistCosine,
    )
}
