// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Corpus commands: similarity matrix, ranking and HNSW search

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::api::DEFAULT_SENTENCES;
use crate::embeddings::{Embedder, ModelEmbedder, RequestKind};
use crate::vector::{rank, similarity_matrix, HnswIndex};

/// Arguments for the similarity command
#[derive(Args, Debug)]
pub struct SimilarityArgs {
    /// File with one sentence per line (defaults to the built-in sentences)
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Embedding policy for corpus entries (code or query)
    #[arg(long, default_value = "query")]
    pub kind: RequestKind,

    /// Rank the corpus against this query instead of printing the matrix
    #[arg(long)]
    pub query: Option<String>,
}

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// File with one sentence per line (defaults to the built-in sentences)
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Embedding policy for corpus entries (code or query)
    #[arg(long, default_value = "query")]
    pub kind: RequestKind,

    /// Query sentence
    #[arg(long)]
    pub query: String,

    /// Number of hits to print
    #[arg(long, default_value_t = 3)]
    pub top_k: usize,

    /// Minimum cosine similarity
    #[arg(long, default_value_t = 0.0)]
    pub threshold: f32,
}

pub async fn similarity(args: SimilarityArgs) -> Result<()> {
    let sentences = load_corpus(args.corpus.as_deref())?;
    let embedder = super::load_embedder().await?;
    let embeddings = embed_corpus(&embedder, &sentences, args.kind).await?;

    match args.query {
        None => {
            let matrix = similarity_matrix(&embeddings)?;
            println!("📐 Similarity matrix ({} x {})", matrix.nrows(), matrix.ncols());
            for row in matrix.rows() {
                let cells: Vec<String> = row.iter().map(|v| format!("{:.4}", v)).collect();
                println!("[{}]", cells.join(", "));
            }
        }
        Some(query) => {
            ensure_comparable(&embedder, args.kind)?;
            let query_embedding = embedder.embed(&query, RequestKind::Query).await?;
            let ranked = rank(&query_embedding, &embeddings);
            for (i, score) in &ranked {
                println!("{:.4}  {}", score, sentences[*i]);
            }
            if let Some((best, score)) = ranked.first() {
                println!("\n✅ Most similar ({:.4}): {}", score, sentences[*best]);
            }
        }
    }
    Ok(())
}

pub async fn search(args: SearchArgs) -> Result<()> {
    let sentences = load_corpus(args.corpus.as_deref())?;
    let embedder = super::load_embedder().await?;
    ensure_comparable(&embedder, args.kind)?;
    let embeddings = embed_corpus(&embedder, &sentences, args.kind).await?;

    let dimensions = embedder.dimension(args.kind);
    let index = HnswIndex::build(
        sentences
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (sentence, vector))| (i.to_string(), vector, json!({ "sentence": sentence }))),
        dimensions,
    )?;

    let query_embedding = embedder.embed(&args.query, RequestKind::Query).await?;
    let hits = index.search(&query_embedding, args.top_k, args.threshold)?;

    println!("🔍 Query: {}", args.query);
    if hits.is_empty() {
        println!("No matches above threshold {}", args.threshold);
    }
    for hit in hits {
        let sentence = hit.metadata.get("sentence").and_then(|s| s.as_str()).unwrap_or_default();
        println!("{:.4}  {}", hit.score, sentence);
    }
    Ok(())
}

/// Queries are always embedded as `query`, so a `code` corpus needs both
/// kinds to share one vector space
fn ensure_comparable(embedder: &ModelEmbedder, corpus_kind: RequestKind) -> Result<()> {
    let corpus = embedder.dimension(corpus_kind);
    let query = embedder.dimension(RequestKind::Query);
    if corpus != query {
        bail!(
            "Cannot compare {} embeddings ({}D) with query embeddings ({}D); use a shared model",
            corpus_kind,
            corpus,
            query
        );
    }
    Ok(())
}

async fn embed_corpus(
    embedder: &ModelEmbedder,
    sentences: &[String],
    kind: RequestKind,
) -> Result<Vec<Vec<f32>>> {
    let embedder = embedder.clone();
    let sentences = sentences.to_vec();
    let embeddings = tokio::task::spawn_blocking(move || {
        embedder.embed_batch_blocking(&sentences, kind)
    })
    .await
    .context("Embedding task failed")??;
    Ok(embeddings)
}

/// Reads one sentence per non-blank line
pub fn load_corpus(path: Option<&Path>) -> Result<Vec<String>> {
    let sentences: Vec<String> = match path {
        None => DEFAULT_SENTENCES.iter().map(|s| s.to_string()).collect(),
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus {}", path.display()))?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    };

    if sentences.is_empty() {
        bail!("Corpus is empty");
    }
    Ok(sentences)
}
