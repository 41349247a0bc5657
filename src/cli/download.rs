// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model download from the Hugging Face Hub

use anyhow::{anyhow, Context, Result};
use clap::Args;
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Model file locations tried in order
pub const MODEL_CANDIDATES: &[&str] = &["onnx/model.onnx", "model.onnx"];
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Arguments for the download command
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Hub repository id (e.g. sentence-transformers/all-MiniLM-L6-v2)
    #[arg(long)]
    pub repo: String,

    /// Branch, tag or commit
    #[arg(long, default_value = "main")]
    pub revision: String,

    /// Directory receiving model.onnx and tokenizer.json
    #[arg(long)]
    pub dest: PathBuf,
}

pub async fn run(args: DownloadArgs) -> Result<()> {
    let dest = args.dest.clone();
    let (model, tokenizer) = tokio::task::spawn_blocking(move || download(&args))
        .await
        .context("Download task failed")??;

    println!("✅ Model saved to {}", model.display());
    println!("✅ Tokenizer saved to {}", tokenizer.display());
    println!(
        "\nSet CODE_MODEL_PATH={} and CODE_TOKENIZER_PATH={} to use it",
        dest.join("model.onnx").display(),
        dest.join(TOKENIZER_FILE).display()
    );
    Ok(())
}

fn download(args: &DownloadArgs) -> Result<(PathBuf, PathBuf)> {
    let api = ApiBuilder::new()
        .with_progress(true)
        .build()
        .context("Failed to initialise Hugging Face Hub client")?;
    let repo = api.repo(Repo::with_revision(
        args.repo.clone(),
        RepoType::Model,
        args.revision.clone(),
    ));

    info!("Fetching {}@{}", args.repo, args.revision);

    let mut model = None;
    for candidate in MODEL_CANDIDATES {
        match repo.get(candidate) {
            Ok(path) => {
                model = Some(path);
                break;
            }
            Err(e) => warn!("{} not available: {}", candidate, e),
        }
    }
    let model = model.ok_or_else(|| {
        anyhow!(
            "No ONNX model in {} (tried {})",
            args.repo,
            MODEL_CANDIDATES.join(", ")
        )
    })?;
    let tokenizer = repo
        .get(TOKENIZER_FILE)
        .with_context(|| format!("No {} in {}", TOKENIZER_FILE, args.repo))?;

    std::fs::create_dir_all(&args.dest)
        .with_context(|| format!("Failed to create {}", args.dest.display()))?;

    Ok((
        copy_into(&model, &args.dest.join("model.onnx"))?,
        copy_into(&tokenizer, &args.dest.join(TOKENIZER_FILE))?,
    ))
}

fn copy_into(from: &Path, to: &Path) -> Result<PathBuf> {
    std::fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(to.to_path_buf())
}
