// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod corpus;
pub mod download;
pub mod embed;
pub mod serve;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::ModelsConfig;
use crate::embeddings::{ModelEmbedder, ModelSet};

/// Embedify CLI
#[derive(Parser, Debug)]
#[command(name = "embedify-cli")]
#[command(version)]
#[command(about = "Embed code and queries, compare sentences, serve the sentence API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed one text and print the vector as JSON
    Embed(embed::EmbedArgs),

    /// Pairwise similarity of a corpus, or the corpus ranked against a query
    Similarity(corpus::SimilarityArgs),

    /// Top matches for a query from an HNSW index over a corpus
    Search(corpus::SearchArgs),

    /// Run the sentence HTTP API
    Serve(serve::ServeArgs),

    /// Download an ONNX model and tokenizer from the Hugging Face Hub
    Download(download::DownloadArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Embed(args) => embed::run(args).await,
        Commands::Similarity(args) => corpus::similarity(args).await,
        Commands::Search(args) => corpus::search(args).await,
        Commands::Serve(args) => serve::run(args).await,
        Commands::Download(args) => download::run(args).await,
    }
}

/// Loads the models named by the environment, as the worker does
pub(crate) async fn load_embedder() -> Result<Arc<ModelEmbedder>> {
    dotenv::dotenv().ok();
    let config = ModelsConfig::from_env().context("Invalid model configuration")?;
    let models = ModelSet::load(&config).await?;
    Ok(Arc::new(
        ModelEmbedder::new(Arc::new(models), config.pooling)
            .with_code_max_tokens(config.code_max_tokens),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::RequestKind;

    #[test]
    fn test_parse_embed() {
        let cli = Cli::try_parse_from(["embedify-cli", "embed", "--kind", "code", "fn main() {}"]).unwrap();
        match cli.command {
            Commands::Embed(args) => {
                assert_eq!(args.kind, RequestKind::Code);
                assert_eq!(args.text, "fn main() {}");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["embedify-cli", "embed", "--kind", "binary", "x"]).is_err());
    }

    #[test]
    fn test_parse_search_defaults() {
        let cli = Cli::try_parse_from(["embedify-cli", "search", "--query", "db migration"]).unwrap();
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.top_k, 3);
                assert_eq!(args.threshold, 0.0);
                assert!(args.corpus.is_none());
                assert_eq!(args.kind, RequestKind::Query);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_code_corpus() {
        let cli = Cli::try_parse_from([
            "embedify-cli",
            "similarity",
            "--kind",
            "code",
            "--corpus",
            "snippets.txt",
            "--query",
            "reverse a string",
        ])
        .unwrap();
        match cli.command {
            Commands::Similarity(args) => {
                assert_eq!(args.kind, RequestKind::Code);
                assert_eq!(args.query.as_deref(), Some("reverse a string"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from([
            "embedify-cli",
            "download",
            "--repo",
            "microsoft/codebert-base",
            "--dest",
            "./models/codebert-base-onnx",
        ])
        .unwrap();
        match cli.command {
            Commands::Download(args) => {
                assert_eq!(args.repo, "microsoft/codebert-base");
                assert_eq!(args.revision, "main");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
