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

//! NewsAPI-style search adapter.
//!
//! Speaks the `/everything` endpoint shape: keyword search joins keywords
//! with AND and sorts by relevancy; recent search constrains `from` to the
//! lookback window and sorts by publish date.

use super::{NewsSearch, SearchError};
use crate::models::news::{article_id, NewsArticle};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Provider-side page size ceiling
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    source: RawSource,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "urlToImage")]
    #[serde(default)]
    url_to_image: Option<String>,
    #[serde(rename = "publishedAt")]
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    name: Option<String>,
}

/// News search over a NewsAPI-compatible endpoint.
pub struct NewsApiClient {
    base_url: String,
    api_key: String,
    http_client: Arc<reqwest::Client>,
}

impl NewsApiClient {
    /// Creates a configured client with a shared HTTP client.
    pub fn new(base_url: &str, api_key: &str, http_client: Arc<reqwest::Client>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http_client,
        }
    }

    async fn everything(
        &self,
        params: &[(&str, String)],
    ) -> Result<Vec<NewsArticle>, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::NotConfigured("news search".to_string()));
        }

        let url = format!("{}/everything", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(params)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::RequestFailed(format!(
                "News API error ({}): {}",
                status,
                &body[..body.len().min(300)]
            )));
        }

        let parsed: EverythingResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        if parsed.status != "ok" {
            return Err(SearchError::RequestFailed(format!(
                "News API status {}: {}",
                parsed.status,
                parsed.message.unwrap_or_default()
            )));
        }

        let articles: Vec<NewsArticle> = parsed
            .articles
            .into_iter()
            .filter_map(to_article)
            .collect();

        debug!(count = articles.len(), "News search returned");
        Ok(articles)
    }
}

/// Maps a raw provider article, dropping entries without a usable title or
/// URL (including the provider's "[Removed]" tombstones).
fn to_article(raw: RawArticle) -> Option<NewsArticle> {
    let title = raw.title?.trim().to_string();
    let url = raw.url?.trim().to_string();
    if title.is_empty() || url.is_empty() || title == "[Removed]" {
        return None;
    }

    Some(NewsArticle {
        id: article_id(&url),
        title,
        url,
        source: raw.source.name.unwrap_or_else(|| "unknown".to_string()),
        author: raw.author.filter(|a| !a.trim().is_empty()),
        published_at: raw.published_at,
        description: raw.description.unwrap_or_default(),
        content: raw.content.filter(|c| !c.trim().is_empty()),
        image_url: raw.url_to_image,
        category: None,
        relevance_score: None,
    })
}

#[async_trait]
impl NewsSearch for NewsApiClient {
    #[instrument(name = "news_search_keywords", skip(self), fields(keywords = keywords.len(), max = max))]
    async fn search_keywords(
        &self,
        keywords: &[String],
        max: usize,
    ) -> Result<Vec<NewsArticle>, SearchError> {
        let query = keywords.join(" AND ");
        let page_size = max.min(MAX_PAGE_SIZE);

        let articles = self
            .everything(&[
                ("q", query),
                ("sortBy", "relevancy".to_string()),
                ("language", "en".to_string()),
                ("pageSize", page_size.to_string()),
            ])
            .await?;

        info!(count = articles.len(), "Keyword news search completed");
        Ok(articles)
    }

    #[instrument(name = "news_search_recent", skip(self, query), fields(hours_back = hours_back, max = max))]
    async fn search_recent(
        &self,
        query: &str,
        hours_back: u32,
        max: usize,
    ) -> Result<Vec<NewsArticle>, SearchError> {
        let from = Utc::now() - ChronoDuration::hours(hours_back as i64);
        let page_size = max.min(MAX_PAGE_SIZE);

        let articles = self
            .everything(&[
                ("q", query.to_string()),
                ("from", from.to_rfc3339()),
                ("sortBy", "publishedAt".to_string()),
                ("language", "en".to_string()),
                ("pageSize", page_size.to_string()),
            ])
            .await?;

        info!(count = articles.len(), "Recent news search completed");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: Option<&str>, url: Option<&str>) -> RawArticle {
        RawArticle {
            source: RawSource {
                name: Some("Example Wire".to_string()),
            },
            author: Some("A. Reporter".to_string()),
            title: title.map(str::to_string),
            description: Some("summary".to_string()),
            url: url.map(str::to_string),
            url_to_image: None,
            published_at: None,
            content: None,
        }
    }

    #[test]
    fn test_to_article_maps_fields() {
        let article = to_article(raw(Some("Headline"), Some("https://e.com/a"))).unwrap();
        assert_eq!(article.title, "Headline");
        assert_eq!(article.source, "Example Wire");
        assert_eq!(article.id, article_id("https://e.com/a"));
        assert!(article.is_valid());
    }

    #[test]
    fn test_to_article_drops_invalid() {
        assert!(to_article(raw(None, Some("https://e.com"))).is_none());
        assert!(to_article(raw(Some("Title"), None)).is_none());
        assert!(to_article(raw(Some("  "), Some("https://e.com"))).is_none());
        assert!(to_article(raw(Some("[Removed]"), Some("https://e.com"))).is_none());
    }

    #[test]
    fn test_everything_response_parses() {
        let body = r#"{
            "status": "ok",
            "totalResults": 1,
            "articles": [{
                "source": {"id": null, "name": "Wire"},
                "author": null,
                "title": "Gas prices climb",
                "description": "desc",
                "url": "https://e.com/gas",
                "urlToImage": null,
                "publishedAt": "2025-06-01T12:00:00Z",
                "content": "body"
            }]
        }"#;
        let parsed: EverythingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, "ok");
        assert_eq!(parsed.articles.len(), 1);
        assert!(parsed.articles[0].published_at.is_some());
    }

    #[tokio::test]
    async fn test_unconfigured_client_errors() {
        let client = NewsApiClient::new(
            "https://newsapi.example/v2",
            "",
            Arc::new(reqwest::Client::new()),
        );
        let result = client.search_keywords(&["gas".to_string()], 10).await;
        assert!(matches!(result, Err(SearchError::NotConfigured(_))));
    }
}
