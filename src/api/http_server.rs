// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::sentences::{ScoredSentence, Sentence, SentenceService, DEFAULT_SEARCH_LIMIT};
use super::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceRequest {
    pub sentence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub sentence: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ScoredSentence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: serde_json::Value,
    pub sentences: usize,
}

pub fn router(service: Arc<SentenceService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/sentences", post(add_handler))
        .route(
            "/sentences/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route("/search", post(search_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(service)
}

/// Serves the sentence API until Ctrl+C
pub async fn start_server(service: Arc<SentenceService>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Sentence API listening on {}", addr);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

async fn health_handler(State(service): State<Arc<SentenceService>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::version::get_version_info(),
        sentences: service.len().await,
    })
}

async fn add_handler(
    State(service): State<Arc<SentenceService>>,
    Json(request): Json<SentenceRequest>,
) -> Result<Json<Sentence>, ApiError> {
    service.add(&request.sentence).await.map(Json)
}

async fn get_handler(
    State(service): State<Arc<SentenceService>>,
    Path(id): Path<String>,
) -> Result<Json<Sentence>, ApiError> {
    service.get(&id).await.map(Json)
}

async fn update_handler(
    State(service): State<Arc<SentenceService>>,
    Path(id): Path<String>,
    Json(request): Json<SentenceRequest>,
) -> Result<Json<Sentence>, ApiError> {
    service.update(&id, &request.sentence).await.map(Json)
}

async fn delete_handler(
    State(service): State<Arc<SentenceService>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    service.delete(&id).await?;
    Ok(Json(DeleteResponse {
        message: format!("Sentence with id {} deleted.", id),
    }))
}

async fn search_handler(
    State(service): State<Arc<SentenceService>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let limit = request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let results = service.search(&request.sentence, limit).await?;
    Ok(Json(SearchResponse {
        query: request.sentence,
        results,
    }))
}
