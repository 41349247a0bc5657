// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Chunked max-pooling and legacy mean pooling through ModelEmbedder

use crate::common::{hash_embedder, l2_norm, words, HashEncoder, HIDDEN};
use embedify::embeddings::chunker::{chunk_token_ids, ChunkConfig};
use embedify::embeddings::pooling::{combine_chunks, first_position, normalized};
use embedify::embeddings::{Embedder, Encoder, PoolingPolicy, RequestKind};

#[tokio::test]
async fn test_query_embedding_is_unit_length_and_deterministic() {
    let embedder = hash_embedder(PoolingPolicy::Chunked);

    let first = embedder.embed("sort an array", RequestKind::Query).await.unwrap();
    let second = embedder.embed("sort an array", RequestKind::Query).await.unwrap();

    assert_eq!(first.len(), HIDDEN);
    assert_eq!(first.len(), embedder.dimension(RequestKind::Query));
    assert!((l2_norm(&first) - 1.0).abs() < 1e-5);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_query_ignores_words_past_128_tokens() {
    let embedder = hash_embedder(PoolingPolicy::Chunked);

    let base = words(126);
    let longer = format!("{} extra words after the limit", base);

    let a = embedder.embed(&base, RequestKind::Query).await.unwrap();
    let b = embedder.embed(&longer, RequestKind::Query).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_long_code_is_max_pooled_across_chunks() {
    let embedder = hash_embedder(PoolingPolicy::Chunked);
    let encoder = HashEncoder::default();
    let content = words(1200);

    // Reference computation, chunk by chunk
    let ids = encoder.tokenize(&content).unwrap();
    let windows = chunk_token_ids(&ids, &ChunkConfig::default()).unwrap();
    assert_eq!(windows.len(), 3);
    let chunk_embeddings: Vec<Vec<f32>> = windows
        .iter()
        .map(|w| {
            let hidden = encoder.forward(&encoder.special_tokens().frame(w)).unwrap();
            normalized(&first_position(hidden.view()).unwrap())
        })
        .collect();
    let expected = combine_chunks(&chunk_embeddings).unwrap();

    let embedding = embedder.embed(&content, RequestKind::Code).await.unwrap();
    assert_eq!(embedding.len(), HIDDEN);
    assert!((l2_norm(&embedding) - 1.0).abs() < 1e-5);
    for (got, want) in embedding.iter().zip(&expected) {
        assert!((got - want).abs() < 1e-6);
    }
}

#[test]
fn test_two_chunk_combine_numerically() {
    let c1 = vec![3.0, 0.0, 4.0];
    let c2 = vec![0.0, 2.0, 0.0];

    // normalize(c1) = [0.6, 0, 0.8], normalize(c2) = [0, 1, 0]
    // max = [0.6, 1, 0.8], norm = sqrt(2)
    let combined = combine_chunks(&[normalized(&c1), normalized(&c2)]).unwrap();
    let s = 2f32.sqrt();
    let expected = [0.6 / s, 1.0 / s, 0.8 / s];
    for (got, want) in combined.iter().zip(expected) {
        assert!((got - want).abs() < 1e-6, "{:?}", combined);
    }
}

#[tokio::test]
async fn test_short_code_matches_single_window() {
    let embedder = hash_embedder(PoolingPolicy::Chunked);
    let encoder = HashEncoder::default();

    let content = "fn main ( ) { println! ( \"hi\" ) ; }";
    let ids = encoder.tokenize(content).unwrap();
    let hidden = encoder.forward(&encoder.special_tokens().frame(&ids)).unwrap();
    let expected = normalized(&first_position(hidden.view()).unwrap());

    let embedding = embedder.embed(content, RequestKind::Code).await.unwrap();
    for (got, want) in embedding.iter().zip(&expected) {
        assert!((got - want).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_mean_policy_is_not_normalized() {
    let embedder = hash_embedder(PoolingPolicy::Mean);

    let embedding = embedder.embed(&words(40), RequestKind::Code).await.unwrap();
    assert_eq!(embedding.len(), HIDDEN);
    assert!((l2_norm(&embedding) - 1.0).abs() > 1e-3);

    // Same policy regardless of kind
    let as_query = embedder.embed(&words(40), RequestKind::Query).await.unwrap();
    assert_eq!(embedding, as_query);
}

#[tokio::test]
async fn test_empty_content_still_embeds() {
    let embedder = hash_embedder(PoolingPolicy::Chunked);
    for kind in RequestKind::ALL {
        let embedding = embedder.embed("", kind).await.unwrap();
        assert_eq!(embedding.len(), HIDDEN);
        assert!((l2_norm(&embedding) - 1.0).abs() < 1e-5);
    }
}
