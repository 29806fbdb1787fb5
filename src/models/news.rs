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

//! News article model and its deterministic identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Derives a stable article id from its URL.
///
/// Two articles share an id iff they share a URL, so repeated vector-store
/// writes of the same article upsert instead of duplicating.
pub fn article_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(&digest[..16])
}

/// A news article candidate flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    /// Stable id, hash of the URL
    pub id: String,
    /// Headline
    pub title: String,
    /// Canonical URL
    pub url: String,
    /// Publisher name
    pub source: String,
    /// Byline, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Publication time, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Short summary from the provider
    #[serde(default)]
    pub description: String,
    /// Full body text; may be scraped lazily
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Lead image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Provider category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Ranker-assigned relevance in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl NewsArticle {
    /// Builds an article with its id derived from the URL.
    pub fn new(title: String, url: String, source: String) -> Self {
        Self {
            id: article_id(&url),
            title,
            url,
            source,
            author: None,
            published_at: None,
            description: String::new(),
            content: None,
            image_url: None,
            category: None,
            relevance_score: None,
        }
    }

    /// Candidates with an empty title or URL never enter the context.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }

    /// Text used for embedding generation.
    pub fn embedding_text(&self) -> String {
        format!("{} - {}", self.title, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_id_is_stable() {
        let a = article_id("https://example.com/story");
        let b = article_id("https://example.com/story");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_article_id_differs_per_url() {
        assert_ne!(
            article_id("https://example.com/a"),
            article_id("https://example.com/b")
        );
    }

    #[test]
    fn test_new_derives_id_from_url() {
        let article = NewsArticle::new(
            "Gas prices climb".to_string(),
            "https://example.com/gas".to_string(),
            "Example Wire".to_string(),
        );
        assert_eq!(article.id, article_id("https://example.com/gas"));
    }

    #[test]
    fn test_validity() {
        let article = NewsArticle::new(
            "Title".to_string(),
            "https://example.com".to_string(),
            "Src".to_string(),
        );
        assert!(article.is_valid());

        let mut untitled = article.clone();
        untitled.title = "  ".to_string();
        assert!(!untitled.is_valid());

        let mut no_url = article;
        no_url.url = String::new();
        assert!(!no_url.is_valid());
    }

    #[test]
    fn test_embedding_text() {
        let mut article = NewsArticle::new(
            "Gas prices climb".to_string(),
            "https://example.com/gas".to_string(),
            "Example Wire".to_string(),
        );
        article.description = "Prices rose 4% this week.".to_string();
        assert_eq!(
            article.embedding_text(),
            "Gas prices climb - Prices rose 4% this week."
        );
    }

    #[test]
    fn test_optional_fields_omitted_in_json() {
        let article = NewsArticle::new(
            "T".to_string(),
            "https://e.com".to_string(),
            "S".to_string(),
        );
        let json = serde_json::to_string(&article).unwrap();
        assert!(!json.contains("relevance_score"));
        assert!(!json.contains("author"));
    }
}
