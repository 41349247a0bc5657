// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding worker: consumes requests, publishes responses

pub mod listener;
pub mod request;
pub mod response;

pub use listener::{EmbeddingWorker, Outcome, RunSummary, StopReason, WorkerError};
pub use request::{EmbeddingRequest, RequestError, RequestId, RequestSummary};
pub use response::EmbeddingResponse;
