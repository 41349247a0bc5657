// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod broker;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod vector;
pub mod version;
pub mod worker;

// Re-export main types
pub use api::SentenceService;
pub use broker::{AmqpBroker, MemoryBroker, MessageSource, ResponsePublisher};
pub use config::{BrokerConfig, ModelsConfig, WorkerConfig};
pub use embeddings::{
    Embedder, EmbeddingError, ModelEmbedder, ModelSet, OnnxEncoder, PoolingPolicy, RequestKind,
};
pub use vector::{HnswIndex, SearchHit};
pub use worker::{
    EmbeddingRequest, EmbeddingResponse, EmbeddingWorker, Outcome, RunSummary, StopReason,
};
