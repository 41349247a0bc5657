// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Args;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::api::{start_server, SentenceService};

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "EMBEDIFY_API_ADDR", default_value = "127.0.0.1:8000")]
    pub addr: SocketAddr,

    /// Insert the built-in sentences on start-up
    #[arg(long)]
    pub seed_defaults: bool,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let embedder = super::load_embedder().await?;
    let service = Arc::new(SentenceService::new(embedder));

    if args.seed_defaults {
        service.seed_defaults().await?;
    }

    println!("🚀 Sentence API on http://{}", args.addr);
    start_server(service, args.addr).await
}
