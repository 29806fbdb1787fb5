// Copyright 2025 Assistance Micro Design
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Embedding Service Module
//!
//! Vector embedding generation for semantic retrieval, behind the
//! [`Embedder`] capability trait. The production adapter speaks the
//! OpenAI-compatible `/embeddings` endpoint.
//!
//! Batch generation runs items through a bounded-concurrency stream; a
//! single failed item aborts its batch after per-item retries are
//! exhausted.

use crate::error::{AgentError, ErrorKind};
use crate::llm::retry::{with_retry, RetryConfig};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

// ============================================================================
// Constants
// ============================================================================

/// Parallel requests per embedding batch
pub const EMBEDDING_CONCURRENCY: usize = 5;

/// Maximum text length for embedding (characters)
pub const MAX_EMBEDDING_TEXT_LENGTH: usize = 50_000;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during embedding operations
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid response format from embedding API
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// Provider not configured or missing credentials
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Text too long for embedding
    #[error("Text too long: {0} chars, max {1}")]
    TextTooLong(usize, usize),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Dimension mismatch (expected vs actual)
    #[error("Dimension mismatch: expected {0}, got {1}")]
    DimensionMismatch(usize, usize),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EmbeddingError {
    /// Transient errors worth retrying per item.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::RequestFailed(_) | EmbeddingError::ConnectionError(_)
        )
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            EmbeddingError::ConnectionError(err.to_string())
        } else {
            EmbeddingError::RequestFailed(err.to_string())
        }
    }
}

impl From<EmbeddingError> for AgentError {
    fn from(err: EmbeddingError) -> Self {
        let kind = match &err {
            EmbeddingError::ConnectionError(_) => ErrorKind::Unavailable,
            EmbeddingError::NotConfigured(_) | EmbeddingError::Internal(_) => ErrorKind::Internal,
            EmbeddingError::TextTooLong(_, _) => ErrorKind::Validation,
            _ => ErrorKind::External,
        };
        AgentError::new(kind, "embedding_failed", err.to_string()).with_source(err)
    }
}

// ============================================================================
// Capability Trait
// ============================================================================

/// Embedding generation capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Vector dimension produced by this embedder
    fn dimension(&self) -> usize;

    /// Embeds a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds a batch, preserving input order.
    ///
    /// Runs at most [`EMBEDDING_CONCURRENCY`] requests in parallel with
    /// per-item linear-backoff retries; any item that still fails aborts
    /// the whole batch.
    async fn embed_batch(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

// ============================================================================
// OpenAI-compatible HTTP adapter
// ============================================================================

/// API request body for embeddings
#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

/// API response for embeddings
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// One embedding in the response
#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedder over an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    retry: RetryConfig,
    http_client: Arc<reqwest::Client>,
}

impl HttpEmbedder {
    /// Creates a configured embedder with a shared HTTP client.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        dimension: usize,
        http_client: Arc<reqwest::Client>,
    ) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
            retry: RetryConfig::default(),
            http_client,
        }
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.api_key.is_empty() {
            return Err(EmbeddingError::NotConfigured(self.model.clone()));
        }
        if text.len() > MAX_EMBEDDING_TEXT_LENGTH {
            return Err(EmbeddingError::TextTooLong(
                text.len(),
                MAX_EMBEDDING_TEXT_LENGTH,
            ));
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::RequestFailed(format!(
                "Embedding API error ({}): {}",
                status,
                &body[..body.len().min(300)]
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("Empty data array".to_string()))?;

        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch(
                self.dimension,
                vector.len(),
            ));
        }

        Ok(vector)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[instrument(name = "embed", skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self.embed_once(text).await?;
        debug!(dimension = vector.len(), "Embedding generated");
        Ok(vector)
    }

    #[instrument(name = "embed_batch", skip(self, texts, cancel), fields(batch_size = texts.len()))]
    async fn embed_batch(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut indexed: Vec<(usize, Vec<f32>)> = stream::iter(texts.iter().enumerate())
            .map(|(index, text)| async move {
                let vector = with_retry(
                    || self.embed_once(text),
                    &self.retry,
                    EmbeddingError::is_retryable,
                    cancel,
                )
                .await?;
                Ok::<_, EmbeddingError>((index, vector))
            })
            .buffer_unordered(EMBEDDING_CONCURRENCY)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;

        indexed.sort_by_key(|(index, _)| *index);
        let vectors: Vec<Vec<f32>> = indexed.into_iter().map(|(_, v)| v).collect();

        info!(count = vectors.len(), "Embedding batch generated");
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> HttpEmbedder {
        let client = Arc::new(
            reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .expect("Failed to create HTTP client"),
        );
        HttpEmbedder::new("https://api.example.com/v1/", "key", "embed-small", 8, client)
    }

    #[test]
    fn test_dimension() {
        assert_eq!(embedder().dimension(), 8);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(EmbeddingError::RequestFailed("500".to_string()).is_retryable());
        assert!(EmbeddingError::ConnectionError("refused".to_string()).is_retryable());
        assert!(!EmbeddingError::DimensionMismatch(8, 4).is_retryable());
        assert!(!EmbeddingError::TextTooLong(10, 5).is_retryable());
    }

    #[tokio::test]
    async fn test_text_too_long_rejected() {
        let embedder = embedder();
        let long = "x".repeat(MAX_EMBEDDING_TEXT_LENGTH + 1);
        let result = embedder.embed_once(&long).await;
        assert!(matches!(result, Err(EmbeddingError::TextTooLong(_, _))));
    }

    #[tokio::test]
    async fn test_empty_batch_is_empty() {
        let embedder = embedder();
        let cancel = CancellationToken::new();
        let result = embedder.embed_batch(&[], &cancel).await.unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_error_kind_mapping() {
        use crate::error::ErrorKind;
        let err: AgentError = EmbeddingError::ConnectionError("down".to_string()).into();
        assert_eq!(err.kind, ErrorKind::Unavailable);
        let err: AgentError = EmbeddingError::InvalidResponse("bad".to_string()).into();
        assert_eq!(err.kind, ErrorKind::External);
    }
}
