// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Sentence similarity HTTP API

pub mod errors;
pub mod http_server;
pub mod sentences;

pub use errors::{ApiError, ErrorResponse};
pub use http_server::{
    router, start_server, DeleteResponse, HealthResponse, SearchRequest, SearchResponse,
    SentenceRequest,
};
pub use sentences::{ScoredSentence, Sentence, SentenceService, DEFAULT_SENTENCES};
