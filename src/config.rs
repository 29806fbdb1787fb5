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

//! Environment-driven configuration.
//!
//! Every knob has a development-friendly default so the binary starts with
//! nothing but provider credentials exported. Variables use the `NEWSMIND_`
//! prefix.

use std::time::Duration;

/// Default outer per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default shutdown drain grace period
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address
    pub bind_addr: String,
    /// Embedded database path
    pub db_path: String,

    /// OpenAI-compatible chat completions base URL
    pub llm_base_url: String,
    /// API key for the LLM provider
    pub llm_api_key: String,
    /// Chat model id
    pub llm_model: String,
    /// Embedding model id
    pub embedding_model: String,
    /// Embedding vector dimension
    pub embedding_dimension: usize,

    /// News search API base URL
    pub news_base_url: String,
    /// News search API key
    pub news_api_key: String,
    /// Video search API base URL
    pub video_base_url: String,
    /// Video search API key
    pub video_api_key: String,

    /// Outer per-request deadline
    pub request_timeout: Duration,
    /// Shutdown drain grace period
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            db_path: "./data/newsmind_db".to_string(),
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_api_key: String::new(),
            llm_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            news_base_url: "https://newsapi.org/v2".to_string(),
            news_api_key: String::new(),
            video_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            video_api_key: String::new(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

impl Config {
    /// Builds a configuration from `NEWSMIND_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("NEWSMIND_BIND_ADDR", defaults.bind_addr),
            db_path: env_or("NEWSMIND_DB_PATH", defaults.db_path),
            llm_base_url: env_or("NEWSMIND_LLM_BASE_URL", defaults.llm_base_url),
            llm_api_key: env_or("NEWSMIND_LLM_API_KEY", defaults.llm_api_key),
            llm_model: env_or("NEWSMIND_LLM_MODEL", defaults.llm_model),
            embedding_model: env_or("NEWSMIND_EMBEDDING_MODEL", defaults.embedding_model),
            embedding_dimension: env_parse_or(
                "NEWSMIND_EMBEDDING_DIMENSION",
                defaults.embedding_dimension,
            ),
            news_base_url: env_or("NEWSMIND_NEWS_BASE_URL", defaults.news_base_url),
            news_api_key: env_or("NEWSMIND_NEWS_API_KEY", defaults.news_api_key),
            video_base_url: env_or("NEWSMIND_VIDEO_BASE_URL", defaults.video_base_url),
            video_api_key: env_or("NEWSMIND_VIDEO_API_KEY", defaults.video_api_key),
            request_timeout: Duration::from_secs(env_parse_or(
                "NEWSMIND_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            shutdown_grace: Duration::from_secs(env_parse_or(
                "NEWSMIND_SHUTDOWN_GRACE_SECS",
                DEFAULT_SHUTDOWN_GRACE_SECS,
            )),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default,
    }
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.embedding_dimension, 1536);
        assert_eq!(
            config.request_timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_env_parse_or_falls_back_on_garbage() {
        // Unset variable falls back
        assert_eq!(env_parse_or("NEWSMIND_TEST_UNSET_VAR", 42usize), 42);
    }

    #[test]
    fn test_env_or_ignores_blank() {
        std::env::set_var("NEWSMIND_TEST_BLANK_VAR", "   ");
        assert_eq!(
            env_or("NEWSMIND_TEST_BLANK_VAR", "fallback".to_string()),
            "fallback"
        );
        std::env::remove_var("NEWSMIND_TEST_BLANK_VAR");
    }
}
