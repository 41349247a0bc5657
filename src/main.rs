// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{bail, Context, Result};
use embedify::{
    broker::AmqpBroker,
    config::{Topology, WorkerConfig},
    embeddings::{ModelEmbedder, ModelSet},
    worker::{EmbeddingWorker, StopReason},
};
use std::{env, sync::Arc};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting Embedify worker...\n");
    println!("📦 {}", embedify::version::get_version_string());
    println!("🔖 Build: {}", embedify::version::VERSION);
    println!();

    let config = WorkerConfig::from_env().context("Invalid configuration")?;

    println!("🧠 Loading embedding models...");
    let models = Arc::new(ModelSet::load(&config.models).await?);
    for model in models.list_models() {
        println!(
            "✅ {} ({}D, max {} tokens) serving {:?}",
            model.name, model.dimensions, model.max_tokens, model.kinds
        );
    }
    let embedder = Arc::new(
        ModelEmbedder::new(models, config.models.pooling)
            .with_code_max_tokens(config.models.code_max_tokens),
    );
    println!("   Pooling policy: {:?}", embedder.policy());

    println!("🐇 Connecting to RabbitMQ at {}...", config.broker.display_target());
    let broker = AmqpBroker::connect(&config.broker, Topology::default()).await?;
    let mut consumer = broker.consumer().await?;
    let worker = EmbeddingWorker::new(embedder, broker.publisher());

    let topology = broker.topology();
    println!("\n{}", "=".repeat(60));
    println!("Embedify worker ready");
    println!("  Requests:  {}", topology.requests_queue);
    for (queue, key) in &topology.response_bindings {
        println!("  Responses: {} (routing key '{}')", queue, key);
    }
    println!("\nPress Ctrl+C to shutdown...");
    println!("{}\n", "=".repeat(60));

    let summary = worker.run(&mut consumer, shutdown_signal()).await?;
    println!(
        "\n⏹️  Worker stopped: {} processed, {} rejected",
        summary.processed, summary.rejected
    );

    if summary.stop == StopReason::SourceClosed {
        bail!("RabbitMQ consumer closed; the connection was lost");
    }

    broker.close().await?;
    println!("👋 Goodbye!");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
