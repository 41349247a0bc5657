// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP errors for the sentence API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::vector::IndexError;

/// JSON body returned for every error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error for {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::Index(IndexError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::Index(IndexError::DuplicateId(_)) => StatusCode::CONFLICT,
            ApiError::Embedding(_) | ApiError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Embedding(e) => e.error_code(),
            ApiError::Index(e) => e.error_code(),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, details) = match self {
            ApiError::NotFound(_) | ApiError::Index(IndexError::NotFound(_)) => ("not_found", None),
            ApiError::ValidationError { field, .. } => {
                let mut details = HashMap::new();
                details.insert("field".to_string(), serde_json::Value::String(field.clone()));
                ("validation_error", Some(details))
            }
            ApiError::Embedding(_) | ApiError::Index(_) => ("internal_error", None),
        };

        let message = match self {
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::ValidationError { message, .. } => message.clone(),
            other => other.to_string(),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status_code().is_server_error() {
            tracing::error!(code = self.error_code(), "Request failed: {}", self);
        }
        (self.status_code(), Json(self.to_response())).into_response()
    }
}
