// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Token windowing for long inputs
//!
//! Content is tokenized without special tokens, split into overlapping
//! windows, and each window is framed with the model's own begin/end
//! tokens before the forward pass. The window size counts the special
//! tokens, so a 512-token window carries 510 content tokens.

use super::EmbeddingError;

/// Maximum window length (special tokens included) for code inputs
pub const CODE_WINDOW_TOKENS: usize = 512;

/// Content tokens shared by consecutive code windows
pub const CODE_WINDOW_OVERLAP: usize = 50;

/// Maximum sequence length (special tokens included) for query inputs
pub const QUERY_MAX_TOKENS: usize = 128;

/// Begin/end-of-sequence token ids of a tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub bos: u32,
    pub eos: u32,
}

impl SpecialTokens {
    /// Number of special tokens added to every window
    pub const COUNT: usize = 2;

    /// Wraps content ids as `bos ids… eos`
    pub fn frame(&self, content: &[u32]) -> Vec<u32> {
        let mut ids = Vec::with_capacity(content.len() + Self::COUNT);
        ids.push(self.bos);
        ids.extend_from_slice(content);
        ids.push(self.eos);
        ids
    }
}

/// Window size and overlap for a chunked input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum tokens per window, special tokens included
    pub window_tokens: usize,
    /// Content tokens repeated from the end of the previous window
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window_tokens: CODE_WINDOW_TOKENS,
            overlap: CODE_WINDOW_OVERLAP,
        }
    }
}

impl ChunkConfig {
    pub fn new(window_tokens: usize, overlap: usize) -> Result<Self, EmbeddingError> {
        let config = Self {
            window_tokens,
            overlap,
        };
        config.content_tokens()?;
        Ok(config)
    }

    /// Caps the window at a model's maximum sequence length
    pub fn capped_at(self, max_tokens: usize) -> Self {
        Self {
            window_tokens: self.window_tokens.min(max_tokens),
            ..self
        }
    }

    /// Content tokens per window
    pub fn content_tokens(&self) -> Result<usize, EmbeddingError> {
        let content = self
            .window_tokens
            .checked_sub(SpecialTokens::COUNT)
            .filter(|&c| c > 0)
            .ok_or_else(|| {
                EmbeddingError::InvalidChunking(format!(
                    "window of {} tokens leaves no room for content",
                    self.window_tokens
                ))
            })?;

        if self.overlap >= content {
            return Err(EmbeddingError::InvalidChunking(format!(
                "overlap ({}) must be less than content tokens per window ({})",
                self.overlap, content
            )));
        }
        Ok(content)
    }

    /// Distance between the starts of consecutive windows
    pub fn stride(&self) -> Result<usize, EmbeddingError> {
        Ok(self.content_tokens()? - self.overlap)
    }
}

/// Splits content ids into overlapping windows
///
/// ```text
/// start = 0
/// while true:
///   end = min(start + content_tokens, len)
///   emit ids[start..end]
///   if end == len: stop
///   start += content_tokens - overlap
/// ```
///
/// An empty input yields a single empty window so that the caller still
/// runs one forward pass over `bos eos`.
pub fn chunk_token_ids(ids: &[u32], config: &ChunkConfig) -> Result<Vec<Vec<u32>>, EmbeddingError> {
    let content = config.content_tokens()?;
    let stride = config.stride()?;

    if ids.is_empty() {
        return Ok(vec![Vec::new()]);
    }

    let mut windows = Vec::with_capacity(ids.len().div_ceil(stride));
    let mut start = 0usize;
    loop {
        let end = (start + content).min(ids.len());
        windows.push(ids[start..end].to_vec());
        if end == ids.len() {
            break;
        }
        start += stride;
    }

    Ok(windows)
}

/// Keeps the leading content ids that fit in `max_total_tokens` once framed
pub fn truncate_ids(ids: &[u32], max_total_tokens: usize) -> &[u32] {
    let max_content = max_total_tokens.saturating_sub(SpecialTokens::COUNT);
    &ids[..ids.len().min(max_content)]
}
