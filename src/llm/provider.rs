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

//! Low-level LLM provider trait and common types.

use crate::error::{AgentError, ErrorKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// LLM response from a completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text content
    pub content: String,
    /// Number of input tokens (prompt)
    pub tokens_input: usize,
    /// Number of output tokens (completion)
    pub tokens_output: usize,
    /// Model used for generation
    pub model: String,
    /// Finish reason (if available)
    pub finish_reason: Option<String>,
}

/// LLM error types
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider not configured
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// API key missing
    #[error("API key missing for provider: {0}")]
    MissingApiKey(String),

    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Provider rejected the call for rate reasons
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Response did not match the expected shape
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Circuit breaker rejected the call
    #[error("Circuit open for provider: {0}")]
    CircuitOpen(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Transient errors worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::ConnectionError(_) | LlmError::RequestFailed(_) | LlmError::RateLimited(_)
        )
    }
}

impl From<LlmError> for AgentError {
    fn from(err: LlmError) -> Self {
        let kind = match &err {
            LlmError::RateLimited(_) => ErrorKind::RateLimit,
            LlmError::ConnectionError(_) => ErrorKind::Unavailable,
            LlmError::CircuitOpen(_) => ErrorKind::CircuitBreaker,
            LlmError::NotConfigured(_) | LlmError::MissingApiKey(_) | LlmError::Internal(_) => {
                ErrorKind::Internal
            }
            LlmError::RequestFailed(_) | LlmError::InvalidResponse(_) => ErrorKind::External,
        };
        AgentError::new(kind, "llm_call_failed", err.to_string()).with_source(err)
    }
}

/// Common trait for LLM completion providers.
///
/// Deadlines and cancellation are enforced by the caller, which wraps every
/// call in the request's [`CallContext`](crate::util::CallContext) bounds.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the configured model id
    fn model(&self) -> String;

    /// Checks if the provider is properly configured
    fn is_configured(&self) -> bool;

    /// Generates a completion for the given prompt
    ///
    /// # Arguments
    /// * `prompt` - The user prompt
    /// * `system_prompt` - Optional system prompt
    /// * `temperature` - Sampling temperature (0.0-1.0)
    /// * `max_tokens` - Maximum tokens to generate
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<LlmResponse, LlmError>;

    /// Probes provider reachability for health reporting
    async fn test_connection(&self) -> Result<bool, LlmError>;
}
