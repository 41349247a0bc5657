// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding response published on `embeddings_responses`

use serde::Serialize;

use super::request::RequestId;

/// Response body, routed by the request's `type`
///
/// ```json
/// { "requestId": "r1", "embedding": [0.012, -0.034, ...] }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingResponse {
    pub request_id: RequestId,
    pub embedding: Vec<f32>,
}

impl EmbeddingResponse {
    pub fn new(request_id: RequestId, embedding: Vec<f32>) -> Self {
        Self {
            request_id,
            embedding,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
