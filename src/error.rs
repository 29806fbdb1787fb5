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

//! Core error taxonomy.
//!
//! Collaborator modules keep their own `thiserror` enums; everything that
//! crosses a stage boundary converges into [`AgentError`], which carries the
//! error kind, a stable code, the workflow/stage context and retry hints.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Classification of an error, independent of the type that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or rejected input
    Validation,
    /// A referenced entity does not exist
    NotFound,
    /// Caller lacks permission
    Unauthorized,
    /// A deadline elapsed
    Timeout,
    /// A collaborator rejected the call for rate reasons
    RateLimit,
    /// A collaborator failed
    External,
    /// A bug or invariant violation in this process
    Internal,
    /// A collaborator is unreachable
    Unavailable,
    /// A circuit breaker is open
    CircuitBreaker,
    /// A pipeline stage failed semantically
    Agent,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::External => "external",
            ErrorKind::Internal => "internal",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::CircuitBreaker => "circuit_breaker",
            ErrorKind::Agent => "agent",
        };
        write!(f, "{}", s)
    }
}

/// Where in the system an error occurred
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Request id, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Workflow id, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    /// User id, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Pipeline stage, when the error surfaced inside one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

/// The error type crossing stage and orchestrator boundaries.
#[derive(Debug, Error)]
#[error("[{kind}/{code}] {message}")]
pub struct AgentError {
    /// Error classification
    pub kind: ErrorKind,
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable description
    pub message: String,
    /// Where it happened
    pub context: ErrorContext,
    /// Whether retrying the workflow may succeed
    pub retryable: bool,
    /// Suggested delay before a retry
    pub retry_after: Option<Duration>,
    /// Underlying cause, when one exists
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AgentError {
    /// Creates an error of the given kind with a code and message.
    pub fn new(kind: ErrorKind, code: &str, message: impl Into<String>) -> Self {
        let retryable = matches!(
            kind,
            ErrorKind::Timeout
                | ErrorKind::RateLimit
                | ErrorKind::External
                | ErrorKind::Unavailable
                | ErrorKind::CircuitBreaker
        );
        Self {
            kind,
            code: code.to_string(),
            message: message.into(),
            context: ErrorContext::default(),
            retryable,
            retry_after: None,
            source: None,
        }
    }

    /// Validation failure (never retryable).
    pub fn validation(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, code, message)
    }

    /// Missing entity.
    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    /// Collaborator failure.
    pub fn external(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::External, code, message)
    }

    /// Internal invariant violation.
    pub fn internal(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, code, message)
    }

    /// Stage-semantic failure.
    pub fn agent(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Agent, code, message)
    }

    /// Deadline elapsed.
    pub fn timeout(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, code, message)
    }

    /// Workflow was cancelled. Modeled as a non-retryable agent error with a
    /// fixed code so callers can match on it.
    pub fn cancelled(scope: &str) -> Self {
        let mut err = Self::new(
            ErrorKind::Agent,
            codes::CANCELLED,
            format!("Cancelled: {}", scope),
        );
        err.retryable = false;
        err
    }

    /// Returns true when this error is the cancellation marker.
    pub fn is_cancelled(&self) -> bool {
        self.code == codes::CANCELLED
    }

    /// Attaches an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attaches the stage name.
    pub fn in_stage(mut self, stage: &str) -> Self {
        self.context.stage = Some(stage.to_string());
        self
    }

    /// Attaches workflow identity.
    pub fn for_workflow(mut self, workflow_id: &str, request_id: &str, user_id: &str) -> Self {
        self.context.workflow_id = Some(workflow_id.to_string());
        self.context.request_id = Some(request_id.to_string());
        self.context.user_id = Some(user_id.to_string());
        self
    }

    /// Attaches a suggested retry delay (implies retryable).
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retryable = true;
        self.retry_after = Some(delay);
        self
    }
}

/// Stable error codes used across the pipeline.
pub mod codes {
    /// Workflow cancelled by an external request
    pub const CANCELLED: &str = "workflow_cancelled";
    /// Workflow submitted in a non-pending state
    pub const INVALID_STATE: &str = "invalid_state";
    /// Outer request deadline elapsed
    pub const DEADLINE: &str = "deadline_exceeded";
    /// News search produced no usable articles
    pub const NEWS_SEARCH: &str = "news_search_failed";
    /// Keyword extraction failed
    pub const KEYWORDS: &str = "keyword_extraction_failed";
    /// Article embedding generation failed
    pub const ARTICLE_EMBEDDINGS: &str = "article_embedding_failed";
    /// Article vector-store write failed
    pub const ARTICLE_STORE: &str = "article_store_failed";
    /// Summary synthesis failed
    pub const SYNTHESIS: &str = "synthesis_failed";
}

/// Convenience alias for fallible core operations.
pub type AgentResult<T> = Result<T, AgentError>;
