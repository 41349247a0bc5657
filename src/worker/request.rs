// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding request parsing and validation
//!
//! Request body on `embeddings_requests`:
//! ```json
//! { "requestId": "r1", "type": "query", "content": "sort an array" }
//! ```
//! `requestId` is opaque to the worker: strings and numbers are accepted and
//! echoed back unchanged.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::embeddings::RequestKind;

/// Why a delivery could not be turned into an [`EmbeddingRequest`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Request is missing field '{0}'")]
    MissingField(&'static str),

    #[error("Request field '{field}' is invalid: {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("Unknown request type '{0}'")]
    UnknownType(String),
}

impl RequestError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidJson(_) => "INVALID_JSON",
            RequestError::MissingField(_) => "MISSING_FIELD",
            RequestError::InvalidField { .. } => "INVALID_FIELD",
            RequestError::UnknownType(_) => "UNKNOWN_TYPE",
        }
    }
}

/// Opaque request identifier, echoed verbatim in the response
#[derive(Debug, Clone, PartialEq)]
pub struct RequestId(Value);

impl RequestId {
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId(Value::String(id.to_string()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

impl serde::Serialize for RequestId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Validated request ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRequest {
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub content: String,
}

/// Wire shape before validation; every field optional so each problem gets
/// its own error
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequest {
    request_id: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<Value>,
    content: Option<Value>,
}

/// Fields read from a body for logging, whether or not it validates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSummary {
    pub request_id: Option<String>,
    pub kind: Option<String>,
    pub content_len: Option<usize>,
}

impl EmbeddingRequest {
    /// Parses and validates a delivery body
    pub fn parse(body: &[u8]) -> Result<Self, RequestError> {
        let raw: RawRequest =
            serde_json::from_slice(body).map_err(|e| RequestError::InvalidJson(e.to_string()))?;

        let request_id = match raw.request_id {
            None | Some(Value::Null) => return Err(RequestError::MissingField("requestId")),
            Some(id @ (Value::String(_) | Value::Number(_))) => RequestId(id),
            Some(_) => {
                return Err(RequestError::InvalidField {
                    field: "requestId",
                    message: "expected a string or a number".to_string(),
                })
            }
        };

        let kind = match raw.kind {
            None | Some(Value::Null) => return Err(RequestError::MissingField("type")),
            Some(Value::String(kind)) => kind
                .parse::<RequestKind>()
                .map_err(RequestError::UnknownType)?,
            Some(other) => return Err(RequestError::UnknownType(other.to_string())),
        };

        let content = match raw.content {
            None | Some(Value::Null) => return Err(RequestError::MissingField("content")),
            Some(Value::String(content)) => content,
            Some(_) => {
                return Err(RequestError::InvalidField {
                    field: "content",
                    message: "expected a string".to_string(),
                })
            }
        };

        Ok(Self {
            request_id,
            kind,
            content,
        })
    }

    /// Best-effort read of the logged fields, used before validation
    pub fn summarize(body: &[u8]) -> RequestSummary {
        let Ok(value) = serde_json::from_slice::<Value>(body) else {
            return RequestSummary::default();
        };

        let as_text = |v: &Value| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        RequestSummary {
            request_id: value.get("requestId").map(as_text),
            kind: value.get("type").map(as_text),
            content_len: value
                .get("content")
                .and_then(Value::as_str)
                .map(|c| c.chars().count()),
        }
    }
}
