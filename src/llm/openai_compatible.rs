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

//! Generic OpenAI-compatible provider implementation.
//!
//! Supports any API that follows the OpenAI chat completions format:
//! - POST `{base_url}/chat/completions` for completions
//! - GET `{base_url}/models` for connection testing
//!
//! Handles both standard and reasoning model response formats via
//! a polymorphic content deserializer (string or array of content blocks).

use super::provider::{LlmError, LlmProvider, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

// ============================================================================
// OpenAI-compatible API Types
// ============================================================================

/// API request body for chat completions
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

/// Message in OpenAI API format
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// API response (handles both standard and reasoning models)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[allow(dead_code)]
    id: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

/// Choice in API response
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

/// Response message - content can be string or array of content blocks
#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[allow(dead_code)]
    role: String,
    #[serde(deserialize_with = "deserialize_content")]
    content: String,
}

/// Content block for reasoning models (thinking or text)
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "thinking")]
    Thinking { thinking: Vec<TextBlock> },
    #[serde(rename = "text")]
    Text { text: String },
}

/// Text block within thinking content
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct TextBlock {
    text: String,
}

/// Usage statistics from API response
#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

/// API error response
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(alias = "error")]
    message: Option<ApiErrorDetail>,
}

/// Error detail in API response
#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Content Deserializer (supports both string and array formats)
// ============================================================================

/// Custom deserializer for content field that handles both string and array
/// formats.
fn deserialize_content<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct ContentVisitor;

    impl<'de> Visitor<'de> for ContentVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or an array of content blocks")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut result = String::new();

            while let Some(block) = seq.next_element::<ContentBlock>()? {
                match block {
                    ContentBlock::Thinking { thinking } => {
                        debug!("Reasoning model thinking blocks: {} items", thinking.len());
                    }
                    ContentBlock::Text { text } => {
                        if !result.is_empty() {
                            result.push('\n');
                        }
                        result.push_str(&text);
                    }
                }
            }

            Ok(result)
        }
    }

    deserializer.deserialize_any(ContentVisitor)
}

// ============================================================================
// OpenAI-Compatible Provider
// ============================================================================

/// Generic provider for any OpenAI-compatible API.
///
/// Configured once at construction with base URL, API key and model.
pub struct OpenAiCompatibleProvider {
    /// API key
    api_key: String,
    /// Base URL (e.g., "https://api.openai.com/v1"), no trailing slash
    base_url: String,
    /// Chat model id
    model: String,
    /// Provider name for logging and identification
    provider_name: String,
    /// Shared HTTP client (connection pooling)
    http_client: Arc<reqwest::Client>,
}

impl OpenAiCompatibleProvider {
    /// Creates a configured provider with a shared HTTP client.
    pub fn new(
        provider_name: &str,
        base_url: &str,
        api_key: &str,
        model: &str,
        http_client: Arc<reqwest::Client>,
    ) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            provider_name: provider_name.to_string(),
            http_client,
        }
    }

    fn extract_error_message(&self, status: reqwest::StatusCode, body: &str) -> String {
        let detail = if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(body) {
            error_response
                .message
                .map(|e| e.message)
                .unwrap_or_else(|| body.to_string())
        } else {
            body.to_string()
        };
        format!("{} API error ({}): {}", self.provider_name, status, detail)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn model(&self) -> String {
        self.model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.base_url.is_empty()
    }

    #[instrument(
        name = "llm_complete",
        skip(self, prompt, system_prompt),
        fields(
            provider = %self.provider_name,
            model = %self.model,
            prompt_len = prompt.len()
        )
    )]
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<LlmResponse, LlmError> {
        if !self.is_configured() {
            return Err(LlmError::NotConfigured(self.provider_name.clone()));
        }

        let system_text = system_prompt.unwrap_or("You are a helpful assistant.");

        let request_body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_text.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        };

        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            temperature = temperature,
            max_tokens = max_tokens,
            url = %url,
            "Making request to OpenAI-compatible API"
        );

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::ConnectionError(format!("Connection failed: {}", e))
                } else {
                    LlmError::RequestFailed(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::RequestFailed(format!("Failed to read response body: {}", e)))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited(self.extract_error_message(status, &body)));
        }
        if !status.is_success() {
            return Err(LlmError::RequestFailed(self.extract_error_message(status, &body)));
        }

        let chat_response: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::InvalidResponse(format!(
                "Failed to parse {} response: {}. Body: {}",
                self.provider_name,
                e,
                &body[..body.len().min(500)]
            ))
        })?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        let content = choice.message.content;
        let finish_reason = choice.finish_reason;

        let (tokens_input, tokens_output) = if let Some(usage) = chat_response.usage {
            (usage.prompt_tokens, usage.completion_tokens)
        } else {
            let estimate = |text: &str| -> usize {
                let word_count = text.split_whitespace().count();
                ((word_count as f64) * 1.5).ceil() as usize
            };
            (estimate(prompt) + estimate(system_text), estimate(&content))
        };

        info!(
            provider = %self.provider_name,
            tokens_input = tokens_input,
            tokens_output = tokens_output,
            response_len = content.len(),
            "Completion successful"
        );

        Ok(LlmResponse {
            content,
            tokens_input,
            tokens_output,
            model: self.model.clone(),
            finish_reason,
        })
    }

    /// Tests connection by making a GET request to `{base_url}/models`.
    async fn test_connection(&self) -> Result<bool, LlmError> {
        if !self.is_configured() {
            return Err(LlmError::NotConfigured(self.provider_name.clone()));
        }

        let url = format!("{}/models", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(format!("Connection failed: {}", e)))?;

        Ok(response.status().is_success())
    }
}
