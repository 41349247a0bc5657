// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Transformer Encoder
//!
//! This module wraps ONNX Runtime around an exported transformer encoder
//! (CodeBERT, all-MiniLM-L6-v2, ...) and its HuggingFace tokenizer.
//!
//! Features:
//! - ONNX model loading from disk
//! - GPU acceleration via CUDA (with automatic CPU fallback)
//! - RoBERTa (`<s>`/`</s>`) and BERT (`[CLS]`/`[SEP]`) special tokens
//! - Optional `token_type_ids` input, detected from the graph
//! - Hidden size read from the model at load time

use anyhow::{Context, Result};
use ndarray::{Array2, Axis, Ix2};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::{Encoder, EmbeddingError, SpecialTokens};

/// Sequence limit used when the tokenizer carries no truncation settings
pub const DEFAULT_MAX_TOKENS: usize = 512;

/// ONNX-based transformer encoder
///
/// # Thread Safety
/// All fields are wrapped in Arc for cheap cloning; the session sits behind
/// a Mutex because `Session::run` needs exclusive access.
#[derive(Clone)]
pub struct OnnxEncoder {
    /// ONNX Runtime session
    session: Arc<Mutex<Session>>,

    /// HuggingFace tokenizer
    tokenizer: Arc<Tokenizer>,

    /// Model name (e.g., "codebert-base-onnx")
    model_name: String,

    /// Hidden size reported by the validation pass (768 for CodeBERT)
    hidden_size: usize,

    /// Maximum sequence length, special tokens included
    max_tokens: usize,

    special_tokens: SpecialTokens,

    /// Whether the graph declares a `token_type_ids` input
    uses_token_type_ids: bool,
}

impl std::fmt::Debug for OnnxEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEncoder")
            .field("model_name", &self.model_name)
            .field("hidden_size", &self.hidden_size)
            .field("max_tokens", &self.max_tokens)
            .field("uses_token_type_ids", &self.uses_token_type_ids)
            .finish_non_exhaustive()
    }
}

impl OnnxEncoder {
    /// Loads an encoder from disk paths
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or tokenizer file is missing or invalid
    /// - The tokenizer has neither `<s>`/`</s>` nor `[CLS]`/`[SEP]`
    /// - The validation pass does not output `[batch, seq_len, hidden]`
    ///
    /// # Example
    /// ```ignore
    /// let encoder = OnnxEncoder::load(
    ///     "codebert-base-onnx",
    ///     "./models/codebert-base-onnx/model.onnx",
    ///     "./models/codebert-base-onnx/tokenizer.json",
    /// )?;
    /// assert_eq!(encoder.hidden_size(), 768);
    /// ```
    pub fn load<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!("Initializing ONNX encoder {}", model_name);

        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path);

        let session = match cuda_result {
            Ok(s) => {
                info!("CUDA execution provider initialized for {}", model_name);
                s
            }
            Err(e) => {
                warn!("CUDA execution provider failed: {}", e);
                warn!("Falling back to CPU execution provider");
                Session::builder()
                    .context("Failed to create session builder")?
                    .with_execution_providers([CPUExecutionProvider::default().build()])
                    .context("Failed to set CPU execution provider")?
                    .with_optimization_level(GraphOptimizationLevel::Level3)
                    .context("Failed to set optimization level")?
                    .with_intra_threads(4)
                    .context("Failed to set intra threads")?
                    .commit_from_file(model_path)
                    .with_context(|| {
                        format!("Failed to load ONNX model from {}", model_path.display())
                    })?
            }
        };

        let uses_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        let special_tokens = resolve_special_tokens(&tokenizer)?;
        let max_tokens = tokenizer
            .get_truncation()
            .map(|t| t.max_length)
            .filter(|&len| len > SpecialTokens::COUNT)
            .unwrap_or(DEFAULT_MAX_TOKENS);

        // Windows are cut by the caller; the tokenizer must return every id
        tokenizer
            .with_truncation(None)
            .map_err(|e| anyhow::anyhow!("Failed to disable tokenizer truncation: {}", e))?;
        tokenizer.with_padding(None);

        let mut encoder = Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name,
            hidden_size: 0,
            max_tokens,
            special_tokens,
            uses_token_type_ids,
        };

        // Validation pass: the output shape tells us the hidden size
        let probe = encoder
            .tokenize("validation test")
            .context("Tokenizer validation failed")?;
        let hidden = encoder
            .run(&encoder.special_tokens.frame(&probe))
            .context("Validation inference failed")?;
        encoder.hidden_size = hidden.ncols();

        if encoder.hidden_size == 0 {
            anyhow::bail!("Model {} reports an empty hidden state", encoder.model_name);
        }

        info!(
            "ONNX encoder {} loaded ({} dimensions, max {} tokens, token_type_ids: {})",
            encoder.model_name, encoder.hidden_size, encoder.max_tokens, encoder.uses_token_type_ids
        );

        Ok(encoder)
    }

    /// Runs inference without checking the hidden size
    fn run(&self, ids: &[u32]) -> Result<Array2<f32>, EmbeddingError> {
        if ids.is_empty() {
            return Err(EmbeddingError::Inference("empty input sequence".to_string()));
        }
        if ids.len() > self.max_tokens {
            return Err(EmbeddingError::Inference(format!(
                "sequence of {} tokens exceeds model limit of {}",
                ids.len(),
                self.max_tokens
            )));
        }

        let seq_len = ids.len();
        let input_ids: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = vec![1i64; seq_len];

        let input_ids_array = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let attention_mask_array = Array2::from_shape_vec((1, seq_len), attention_mask)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let mut session_guard = self
            .session
            .lock()
            .map_err(|_| EmbeddingError::ModelUnavailable("session lock poisoned".to_string()))?;

        let outputs = if self.uses_token_type_ids {
            let token_type_ids_array = Array2::<i64>::zeros((1, seq_len));
            session_guard.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids_array)?,
                "attention_mask" => Value::from_array(attention_mask_array)?,
                "token_type_ids" => Value::from_array(token_type_ids_array)?
            ])?
        } else {
            session_guard.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids_array)?,
                "attention_mask" => Value::from_array(attention_mask_array)?
            ])?
        };

        // Use index [0]: export tools name the last hidden state differently
        let output_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let shape = output_array.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] != seq_len {
            return Err(EmbeddingError::OutputShape(format!(
                "{:?} (expected [1, {}, hidden])",
                shape, seq_len
            )));
        }

        let hidden = output_array
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|e| EmbeddingError::OutputShape(e.to_string()))?
            .to_owned();

        debug!("{}: forward pass over {} tokens", self.model_name, seq_len);
        Ok(hidden)
    }
}

impl Encoder for OnnxEncoder {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special_tokens
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;

        Ok(encoding.get_ids().to_vec())
    }

    fn forward(&self, ids: &[u32]) -> Result<Array2<f32>, EmbeddingError> {
        let hidden = self.run(ids)?;
        if hidden.ncols() != self.hidden_size {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.hidden_size,
                actual: hidden.ncols(),
            });
        }
        Ok(hidden)
    }
}

/// Picks the begin/end tokens the model was trained with
fn resolve_special_tokens(tokenizer: &Tokenizer) -> Result<SpecialTokens> {
    for (bos, eos) in [("<s>", "</s>"), ("[CLS]", "[SEP]")] {
        if let (Some(bos), Some(eos)) = (tokenizer.token_to_id(bos), tokenizer.token_to_id(eos)) {
            return Ok(SpecialTokens { bos, eos });
        }
    }
    anyhow::bail!("Tokenizer has neither <s>/</s> nor [CLS]/[SEP] special tokens")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Model-dependent tests live in tests/embeddings/test_onnx_encoder.rs

    #[test]
    fn test_missing_model_file() {
        let result = OnnxEncoder::load(
            "missing",
            "/nonexistent/model.onnx",
            "/nonexistent/tokenizer.json",
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("ONNX model file not found"), "{}", err);
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.onnx");
        std::fs::write(&model_path, b"not really onnx").unwrap();
        let tokenizer_path = dir.path().join("tokenizer.json");

        let result = OnnxEncoder::load("missing-tokenizer", &model_path, &tokenizer_path);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Tokenizer file not found"), "{}", err);
    }
}
