// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the sentence index

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Vector has wrong dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector contains NaN or Infinity values")]
    NonFinite,

    #[error("Id '{0}' is already indexed")]
    DuplicateId(String),

    #[error("Id '{0}' not found")]
    NotFound(String),
}

impl IndexError {
    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            IndexError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            IndexError::NonFinite => "NON_FINITE_VECTOR",
            IndexError::DuplicateId(_) => "DUPLICATE_ID",
            IndexError::NotFound(_) => "NOT_FOUND",
        }
    }
}
