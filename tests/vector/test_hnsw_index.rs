// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! HNSW sentence index over a few hundred vectors

use embedify::vector::{HnswIndex, IndexError};
use serde_json::json;

const DIM: usize = 32;

/// Deterministic pseudo-random vectors
fn vector(seed: usize) -> Vec<f32> {
    (0..DIM)
        .map(|i| {
            let mut x = (seed as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (i as u64 + 1);
            x ^= x >> 33;
            x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
            x ^= x >> 33;
            (x % 10_000) as f32 / 10_000.0 - 0.5
        })
        .collect()
}

fn build(n: usize) -> HnswIndex {
    HnswIndex::build(
        (0..n).map(|i| (format!("v{}", i), vector(i), json!({ "n": i }))),
        DIM,
    )
    .unwrap()
}

#[test]
fn test_each_vector_finds_itself() {
    let index = build(200);
    assert_eq!(index.len(), 200);

    for i in (0..200).step_by(13) {
        let hits = index.search(&vector(i), 1, 0.0).unwrap();
        assert_eq!(hits[0].id, format!("v{}", i));
        assert!((hits[0].score - 1.0).abs() < 1e-4);
        assert_eq!(hits[0].metadata, json!({ "n": i }));
    }
}

#[test]
fn test_results_sorted_and_limited() {
    let index = build(100);
    let hits = index.search(&vector(5), 10, -1.0).unwrap();
    assert_eq!(hits.len(), 10);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_deleted_vectors_never_returned() {
    let mut index = build(100);
    for i in 0..50 {
        assert!(index.delete(&format!("v{}", i)));
    }
    assert_eq!(index.len(), 50);

    for i in 0..50 {
        let hits = index.search(&vector(i), 5, -1.0).unwrap();
        assert_eq!(hits.len(), 5);
        for hit in hits {
            let n: usize = hit.id[1..].parse().unwrap();
            assert!(n >= 50, "deleted id {} returned", hit.id);
        }
    }
}

#[test]
fn test_build_rejects_wrong_dimensions() {
    let result = HnswIndex::build(
        vec![("a".to_string(), vec![1.0; DIM + 1], json!({}))],
        DIM,
    );
    assert_eq!(
        result.unwrap_err(),
        IndexError::DimensionMismatch {
            expected: DIM,
            actual: DIM + 1
        }
    );
}
