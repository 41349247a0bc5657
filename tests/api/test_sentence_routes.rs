// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Sentence API routes exercised through the router with `oneshot`

use crate::common::hash_embedder;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use embedify::api::{router, SentenceService, DEFAULT_SENTENCES};
use embedify::embeddings::PoolingPolicy;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (Router, Arc<SentenceService>) {
    let service = Arc::new(SentenceService::new(Arc::new(hash_embedder(
        PoolingPolicy::Chunked,
    ))));
    (router(service.clone()), service)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_health_reports_count() {
    let (app, service) = app();
    service.seed_defaults().await.unwrap();

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sentences"], DEFAULT_SENTENCES.len());
    assert_eq!(body["version"]["version"], embedify::version::VERSION_NUMBER);
    assert!(body["version"]["features"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == "sentence-index"));
}

#[tokio::test]
async fn test_add_get_update_delete() {
    let (app, _) = app();

    let (status, created) = call(
        &app,
        "POST",
        "/sentences",
        Some(json!({ "sentence": "Fixed the login bug" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["sentence"], "Fixed the login bug");

    let (status, fetched) = call(&app, "GET", &format!("/sentences/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = call(
        &app,
        "PUT",
        &format!("/sentences/{}", id),
        Some(json!({ "sentence": "Fixed the logout bug" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated, json!({ "id": id, "sentence": "Fixed the logout bug" }));

    let (status, deleted) = call(&app, "DELETE", &format!("/sentences/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(deleted["message"].as_str().unwrap().contains(&id));

    let (status, body) = call(&app, "GET", &format!("/sentences/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_type"], "not_found");
}

#[tokio::test]
async fn test_missing_ids_are_404() {
    let (app, _) = app();

    let (status, _) = call(&app, "DELETE", "/sentences/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        "PUT",
        "/sentences/nope",
        Some(json!({ "sentence": "anything" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_sentence_is_400() {
    let (app, _) = app();
    let (status, body) = call(&app, "POST", "/sentences", Some(json!({ "sentence": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
    assert_eq!(body["details"]["field"], "sentence");
}

#[tokio::test]
async fn test_search_returns_exact_match_first() {
    let (app, service) = app();
    service.seed_defaults().await.unwrap();

    let query = DEFAULT_SENTENCES[12];
    let (status, body) = call(&app, "POST", "/search", Some(json!({ "sentence": query }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], query);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["sentence"], query);
    assert!((results[0]["score"].as_f64().unwrap() - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_search_limit() {
    let (app, service) = app();
    service.seed_defaults().await.unwrap();

    let (status, body) = call(
        &app,
        "POST",
        "/search",
        Some(json!({ "sentence": "database migration", "limit": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let scores: Vec<f64> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["score"].as_f64().unwrap())
        .collect();
    assert_eq!(scores.len(), 5);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));

    let (status, _) = call(
        &app,
        "POST",
        "/search",
        Some(json!({ "sentence": "database migration", "limit": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
