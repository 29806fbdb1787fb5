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

//! News and video search capabilities and their HTTP adapters.

pub mod news_api;
pub mod youtube;

pub use news_api::NewsApiClient;
pub use youtube::VideoApiClient;

use crate::error::{AgentError, ErrorKind};
use crate::models::news::NewsArticle;
use crate::models::video::Video;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from the search providers
#[derive(Debug, Error)]
pub enum SearchError {
    /// Provider not configured or missing credentials
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Response did not match the expected shape
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// No transcript is available for the video
    #[error("No transcript available for video: {0}")]
    NoTranscript(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            SearchError::ConnectionError(err.to_string())
        } else {
            SearchError::RequestFailed(err.to_string())
        }
    }
}

impl From<SearchError> for AgentError {
    fn from(err: SearchError) -> Self {
        let kind = match &err {
            SearchError::ConnectionError(_) => ErrorKind::Unavailable,
            SearchError::NotConfigured(_) => ErrorKind::Internal,
            SearchError::NoTranscript(_) => ErrorKind::NotFound,
            _ => ErrorKind::External,
        };
        AgentError::new(kind, "search_failed", err.to_string()).with_source(err)
    }
}

/// News search capability.
#[async_trait]
pub trait NewsSearch: Send + Sync {
    /// Searches by AND-joined keywords, up to `max` results (provider caps apply)
    async fn search_keywords(
        &self,
        keywords: &[String],
        max: usize,
    ) -> Result<Vec<NewsArticle>, SearchError>;

    /// Searches recent coverage (`hours_back` window) by free-text query
    async fn search_recent(
        &self,
        query: &str,
        hours_back: u32,
        max: usize,
    ) -> Result<Vec<NewsArticle>, SearchError>;
}

/// Video search capability.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Searches by AND-joined keywords
    async fn search_keywords(
        &self,
        keywords: &[String],
        max: usize,
    ) -> Result<Vec<Video>, SearchError>;

    /// Searches by free-text query
    async fn search_query(&self, query: &str, max: usize) -> Result<Vec<Video>, SearchError>;

    /// Downloads the caption transcript for a video
    async fn get_transcript(&self, video_id: &str) -> Result<String, SearchError>;
}
