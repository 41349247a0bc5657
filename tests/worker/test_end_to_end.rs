// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Worker driven end to end over the in-memory broker

use crate::common::{hash_embedder, l2_norm, words, HIDDEN};
use embedify::broker::{DeliveryState, MemoryBroker};
use embedify::config::{
    Topology, CODE_RESPONSES_QUEUE, QUERY_RESPONSES_QUEUE, REQUESTS_EXCHANGE, REQUESTS_QUEUE,
    RESPONSES_EXCHANGE,
};
use embedify::embeddings::PoolingPolicy;
use embedify::worker::{EmbeddingWorker, StopReason};
use serde_json::Value;
use std::sync::Arc;

async fn run_worker(broker: &MemoryBroker) -> embedify::worker::RunSummary {
    let worker = EmbeddingWorker::new(
        Arc::new(hash_embedder(PoolingPolicy::Chunked)),
        broker.publisher(RESPONSES_EXCHANGE),
    );
    let mut source = broker.consumer(REQUESTS_QUEUE);
    worker
        .run(&mut source, std::future::pending())
        .await
        .expect("worker failed")
}

fn parse(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("response is JSON")
}

#[tokio::test]
async fn test_query_request_yields_one_response() {
    let broker = MemoryBroker::with_topology(&Topology::default()).await;
    broker
        .publish(
            REQUESTS_EXCHANGE,
            "",
            br#"{"requestId":"r1","type":"query","content":"sort an array"}"#,
        )
        .await;

    let summary = run_worker(&broker).await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.stop, StopReason::SourceClosed);

    let responses = broker.drain(QUERY_RESPONSES_QUEUE).await;
    assert_eq!(responses.len(), 1);
    let response = parse(&responses[0]);
    assert_eq!(response["requestId"], "r1");

    let embedding: Vec<f32> = serde_json::from_value(response["embedding"].clone()).unwrap();
    assert_eq!(embedding.len(), HIDDEN);
    assert!((l2_norm(&embedding) - 1.0).abs() < 1e-4);

    assert!(broker.drain(CODE_RESPONSES_QUEUE).await.is_empty());
    assert_eq!(broker.delivery_states().await, vec![(1, DeliveryState::Acked)]);
}

#[tokio::test]
async fn test_unknown_type_is_rejected_without_response() {
    let broker = MemoryBroker::with_topology(&Topology::default()).await;
    broker
        .publish(
            REQUESTS_EXCHANGE,
            "",
            br#"{"requestId":"r2","type":"binary","content":"AAEC"}"#,
        )
        .await;

    let summary = run_worker(&broker).await;
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.rejected, 1);

    assert!(broker.drain(QUERY_RESPONSES_QUEUE).await.is_empty());
    assert!(broker.drain(CODE_RESPONSES_QUEUE).await.is_empty());
    assert_eq!(
        broker.delivery_states().await,
        vec![(1, DeliveryState::Rejected { requeue: false })]
    );
    assert_eq!(broker.queue_len(REQUESTS_QUEUE).await, 0);
}

#[tokio::test]
async fn test_responses_routed_by_type_in_order() {
    let broker = MemoryBroker::with_topology(&Topology::default()).await;
    let code = format!(
        r#"{{"requestId":"c1","type":"code","content":"{}"}}"#,
        words(1500)
    );
    let bodies = [
        code.as_str(),
        r#"{"requestId":"q1","type":"query","content":"optimize image loading"}"#,
        r#"{"type":"query","content":"no id"}"#,
        r#"{"requestId":"c2","type":"code","content":"fn main() {}"}"#,
    ];
    for body in bodies {
        broker.publish(REQUESTS_EXCHANGE, "", body.as_bytes()).await;
    }

    let summary = run_worker(&broker).await;
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.rejected, 1);

    let code_ids: Vec<Value> = broker
        .drain(CODE_RESPONSES_QUEUE)
        .await
        .iter()
        .map(|b| parse(b)["requestId"].clone())
        .collect();
    assert_eq!(code_ids, vec![Value::from("c1"), Value::from("c2")]);

    let query_ids: Vec<Value> = broker
        .drain(QUERY_RESPONSES_QUEUE)
        .await
        .iter()
        .map(|b| parse(b)["requestId"].clone())
        .collect();
    assert_eq!(query_ids, vec![Value::from("q1")]);

    assert_eq!(
        broker.delivery_states().await,
        vec![
            (1, DeliveryState::Acked),
            (2, DeliveryState::Acked),
            (3, DeliveryState::Rejected { requeue: false }),
            (4, DeliveryState::Acked),
        ]
    );
}

#[tokio::test]
async fn test_every_acked_delivery_has_a_response() {
    let broker = MemoryBroker::with_topology(&Topology::default()).await;
    for i in 0..10 {
        let kind = if i % 2 == 0 { "code" } else { "query" };
        let body = format!(r#"{{"requestId":{},"type":"{}","content":"item {}"}}"#, i, kind, i);
        broker.publish(REQUESTS_EXCHANGE, "", body.as_bytes()).await;
    }

    let summary = run_worker(&broker).await;
    assert_eq!(summary.processed, 10);

    let mut ids: Vec<i64> = broker
        .drain(CODE_RESPONSES_QUEUE)
        .await
        .into_iter()
        .chain(broker.drain(QUERY_RESPONSES_QUEUE).await)
        .map(|b| parse(&b)["requestId"].as_i64().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());

    let acked = broker
        .delivery_states()
        .await
        .into_iter()
        .filter(|(_, state)| *state == DeliveryState::Acked)
        .count();
    assert_eq!(acked, 10);
}
