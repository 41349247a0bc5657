// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::embeddings::{Embedder, RequestKind};

/// Arguments for the embed command
#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Embedding policy to apply (code or query)
    #[arg(long, default_value = "query")]
    pub kind: RequestKind,

    /// Text to embed
    pub text: String,
}

pub async fn run(args: EmbedArgs) -> Result<()> {
    let embedder = super::load_embedder().await?;
    let embedding = embedder.embed(&args.text, args.kind).await?;

    println!("{}", json!({ "embedding": embedding }));
    Ok(())
}
