// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for embedding generation

use thiserror::Error;

/// Errors raised while turning text into an embedding
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Model or tokenizer could not be loaded
    #[error("Failed to load model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    /// Tokenizer rejected the input
    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    /// ONNX Runtime (or the stand-in encoder) failed during a forward pass
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Model output did not have the expected shape
    #[error("Unexpected model output shape: {0}")]
    OutputShape(String),

    /// Hidden size disagrees with what the model reported at load time
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Chunk window settings that cannot make progress
    #[error("Invalid chunking configuration: {0}")]
    InvalidChunking(String),

    /// Model handle cannot be used (poisoned session lock)
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Blocking inference task panicked or was cancelled
    #[error("Inference task failed: {0}")]
    TaskFailed(String),
}

impl EmbeddingError {
    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            EmbeddingError::ModelLoad { .. } => "MODEL_LOAD_FAILED",
            EmbeddingError::Tokenization(_) => "TOKENIZATION_FAILED",
            EmbeddingError::Inference(_) => "INFERENCE_FAILED",
            EmbeddingError::OutputShape(_) => "OUTPUT_SHAPE",
            EmbeddingError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            EmbeddingError::InvalidChunking(_) => "INVALID_CHUNKING",
            EmbeddingError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            EmbeddingError::TaskFailed(_) => "TASK_FAILED",
        }
    }
}

impl From<ort::Error> for EmbeddingError {
    fn from(err: ort::Error) -> Self {
        EmbeddingError::Inference(err.to_string())
    }
}
