// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Sentence store: embeds sentences with the query policy and keeps them
//! in an HNSW index keyed by UUID

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::ApiError;
use crate::embeddings::{Embedder, RequestKind};
use crate::vector::HnswIndex;

pub const DEFAULT_SEARCH_LIMIT: usize = 1;
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Sentences the service can be seeded with
pub const DEFAULT_SENTENCES: &[&str] = &[
    "Implemented the export dialog to enhance user data portability.",
    "Refactored the authentication module to improve security protocols.",
    "Updated the user interface to align with the new branding guidelines.",
    "Optimized the database queries to reduce load times.",
    "Conducted a code review to ensure adherence to coding standards.",
    "Integrated third-party API for real-time data synchronization.",
    "Fixed the bug causing application crashes on startup.",
    "Deployed the latest build to the staging environment for testing.",
    "Documented the new features for the upcoming release notes.",
    "Attended the team meeting to discuss project milestones and deadlines.",
    "Implemented input validation to prevent user errors and enhance data integrity.",
    "Updated the API documentation to reflect recent changes and assist developers.",
    "Optimized image loading times to improve overall application performance.",
    "Conducted usability testing to identify and address user experience issues.",
    "Migrated the database to a new server to increase reliability and scalability.",
    "Developed unit tests for the payment processing module to ensure accuracy.",
    "Resolved synchronization issues between the mobile app and the web platform.",
    "Enhanced logging mechanisms to facilitate easier debugging and monitoring.",
    "Collaborated with the design team to refine the dashboard layout for better user engagement.",
    "Reviewed and merged pull requests to incorporate new features into the main codebase.",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sentence {
    pub id: String,
    pub sentence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredSentence {
    pub id: String,
    pub sentence: String,
    pub score: f32,
}

pub struct SentenceService {
    embedder: Arc<dyn Embedder>,
    index: RwLock<HnswIndex>,
}

impl SentenceService {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let dimensions = embedder.dimension(RequestKind::Query);
        Self {
            embedder,
            index: RwLock::new(HnswIndex::new(dimensions)),
        }
    }

    /// Inserts [`DEFAULT_SENTENCES`]; returns how many were added
    pub async fn seed_defaults(&self) -> Result<usize, ApiError> {
        for sentence in DEFAULT_SENTENCES {
            self.add(sentence).await?;
        }
        info!("Seeded {} default sentences", DEFAULT_SENTENCES.len());
        Ok(DEFAULT_SENTENCES.len())
    }

    pub async fn add(&self, sentence: &str) -> Result<Sentence, ApiError> {
        validate_sentence(sentence)?;
        let embedding = self.embedder.embed(sentence, RequestKind::Query).await?;

        let id = Uuid::new_v4().to_string();
        self.index
            .write()
            .await
            .insert(id.clone(), embedding, metadata(sentence))?;

        debug!("Added sentence {}", id);
        Ok(Sentence {
            id,
            sentence: sentence.to_string(),
        })
    }

    pub async fn get(&self, id: &str) -> Result<Sentence, ApiError> {
        let index = self.index.read().await;
        let entry = index.get(id).ok_or_else(|| not_found(id))?;
        Ok(Sentence {
            id: id.to_string(),
            sentence: sentence_of(&entry.metadata),
        })
    }

    /// Re-embeds `sentence` and stores it under the existing `id`
    pub async fn update(&self, id: &str, sentence: &str) -> Result<Sentence, ApiError> {
        validate_sentence(sentence)?;
        if self.index.read().await.get(id).is_none() {
            return Err(not_found(id));
        }

        let embedding = self.embedder.embed(sentence, RequestKind::Query).await?;
        self.index
            .write()
            .await
            .update(id, embedding, metadata(sentence))?;

        debug!("Updated sentence {}", id);
        Ok(Sentence {
            id: id.to_string(),
            sentence: sentence.to_string(),
        })
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        if self.index.write().await.delete(id) {
            debug!("Deleted sentence {}", id);
            Ok(())
        } else {
            Err(not_found(id))
        }
    }

    /// Most similar stored sentences, best first
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredSentence>, ApiError> {
        validate_sentence(query)?;
        if limit == 0 || limit > MAX_SEARCH_LIMIT {
            return Err(ApiError::ValidationError {
                field: "limit".to_string(),
                message: format!("limit must be between 1 and {}", MAX_SEARCH_LIMIT),
            });
        }

        let embedding = self.embedder.embed(query, RequestKind::Query).await?;
        let hits = self.index.read().await.search(&embedding, limit, f32::MIN)?;

        Ok(hits
            .into_iter()
            .map(|hit| ScoredSentence {
                sentence: sentence_of(&hit.metadata),
                id: hit.id,
                score: hit.score,
            })
            .collect())
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }
}

fn validate_sentence(sentence: &str) -> Result<(), ApiError> {
    if sentence.trim().is_empty() {
        return Err(ApiError::ValidationError {
            field: "sentence".to_string(),
            message: "sentence cannot be empty or contain only whitespace".to_string(),
        });
    }
    Ok(())
}

fn metadata(sentence: &str) -> Value {
    json!({ "sentence": sentence })
}

fn sentence_of(metadata: &Value) -> String {
    metadata
        .get("sentence")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("Sentence {} not found", id))
}
