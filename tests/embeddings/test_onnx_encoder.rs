// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Tests against a real ONNX export of CodeBERT
//!
//! Fetch the model first:
//! `embedify-cli download --repo <onnx export of microsoft/codebert-base> --dest ./models/codebert-base-onnx`

use crate::common::l2_norm;
use embedify::embeddings::{Embedder, Encoder, ModelEmbedder, ModelSet, OnnxEncoder, PoolingPolicy, RequestKind};
use std::sync::Arc;

const MODEL_PATH: &str = "./models/codebert-base-onnx/model.onnx";
const TOKENIZER_PATH: &str = "./models/codebert-base-onnx/tokenizer.json";

fn load() -> OnnxEncoder {
    OnnxEncoder::load("codebert-base", MODEL_PATH, TOKENIZER_PATH).expect("Failed to load model")
}

#[test]
#[ignore = "requires ./models/codebert-base-onnx"]
fn test_model_loads_with_hidden_size() {
    let encoder = load();
    assert_eq!(encoder.name(), "codebert-base");
    assert_eq!(encoder.hidden_size(), 768);
    assert_eq!(encoder.max_tokens(), 512);
}

#[test]
#[ignore = "requires ./models/codebert-base-onnx"]
fn test_roberta_special_tokens() {
    let encoder = load();
    let special = encoder.special_tokens();
    assert_eq!(special.bos, 0);
    assert_eq!(special.eos, 2);

    // No special tokens added by tokenize
    let ids = encoder.tokenize("def sort(a): return sorted(a)").unwrap();
    assert!(!ids.is_empty());
    assert_ne!(ids[0], special.bos);
}

#[tokio::test]
#[ignore = "requires ./models/codebert-base-onnx"]
async fn test_query_and_long_code_embeddings() {
    let models = ModelSet::shared(Arc::new(load()));
    let embedder = ModelEmbedder::new(Arc::new(models), PoolingPolicy::Chunked);

    let query = embedder.embed("sort an array", RequestKind::Query).await.unwrap();
    assert_eq!(query.len(), 768);
    assert!((l2_norm(&query) - 1.0).abs() < 1e-4);
    assert_eq!(query, embedder.embed("sort an array", RequestKind::Query).await.unwrap());

    let long_code = "fn add(a: i32, b: i32) -> i32 { a + b }\n".repeat(200);
    let code = embedder.embed(&long_code, RequestKind::Code).await.unwrap();
    assert_eq!(code.len(), 768);
    assert!((l2_norm(&code) - 1.0).abs() < 1e-4);
}
