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

//! Article scraping capability.
//!
//! Extracts paragraph-level body text from article URLs, dropping
//! boilerplate (subscribe/follow/cookie/terms lines). Batch scraping runs
//! with bounded concurrency and retries each failed URL once through the
//! single-URL path.

use crate::error::{AgentError, ErrorKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Parallel requests per scrape batch
pub const SCRAPE_CONCURRENCY: usize = 5;

/// Per-URL scrape budget
pub const SCRAPE_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum characters for a paragraph to count as content
const MIN_PARAGRAPH_CHARS: usize = 40;

/// Lines containing these markers are boilerplate, not article text
const BOILERPLATE_MARKERS: [&str; 8] = [
    "subscribe",
    "sign up",
    "newsletter",
    "follow us",
    "cookie",
    "terms of service",
    "privacy policy",
    "all rights reserved",
];

/// Errors that can occur during scraping
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Failed to fetch the URL
    #[error("Failed to fetch URL: {0}")]
    FetchFailed(String),

    /// URL rejected before fetching
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Fetch succeeded but no usable content was found
    #[error("Content extraction failed: {0}")]
    ExtractionFailed(String),

    /// Per-URL budget elapsed
    #[error("Scrape timed out for: {0}")]
    Timeout(String),
}

impl From<ScrapeError> for AgentError {
    fn from(err: ScrapeError) -> Self {
        let kind = match &err {
            ScrapeError::InvalidUrl(_) => ErrorKind::Validation,
            ScrapeError::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::External,
        };
        AgentError::new(kind, "scrape_failed", err.to_string()).with_source(err)
    }
}

/// Extracted page content with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    /// Source URL
    pub url: String,
    /// Page title
    pub title: String,
    /// Paragraph-level body text
    pub content: String,
    /// Meta description, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Author meta tag, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Published-time meta tag, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// og:image, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Keyword meta tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Result of a batch scrape: pages that worked and URLs that did not.
#[derive(Debug, Default)]
pub struct ScrapeBatch {
    /// Successfully scraped pages
    pub ok: Vec<ScrapedPage>,
    /// URLs that failed with their final error
    pub failed: Vec<(String, ScrapeError)>,
}

/// Scraping capability.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Scrapes one URL within the given budget
    async fn scrape(&self, url: &str, budget: Duration) -> Result<ScrapedPage, ScrapeError>;

    /// Scrapes many URLs with bounded concurrency; each failure is retried
    /// once through the single-URL path before being reported
    async fn scrape_many(&self, urls: &[String]) -> ScrapeBatch;
}

/// HTTP + HTML-selector scraper.
pub struct HttpScraper {
    http_client: Arc<reqwest::Client>,
}

impl HttpScraper {
    /// Creates a scraper over a shared HTTP client.
    pub fn new(http_client: Arc<reqwest::Client>) -> Self {
        Self { http_client }
    }

    async fn fetch(&self, url: &str, budget: Duration) -> Result<String, ScrapeError> {
        let parsed = url::Url::parse(url).map_err(|e| ScrapeError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ScrapeError::InvalidUrl(
                "Only HTTP/HTTPS URLs are supported".to_string(),
            ));
        }

        let request = self.http_client.get(url).timeout(budget).send();
        let response = request.await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::Timeout(url.to_string())
            } else {
                ScrapeError::FetchFailed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(ScrapeError::FetchFailed(format!(
                "HTTP {} for {}",
                response.status().as_u16(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ScrapeError::ExtractionFailed(e.to_string()))
    }
}

/// True for lines that read like site chrome rather than article text.
fn is_boilerplate(line: &str) -> bool {
    let lower = line.to_lowercase();
    BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Extracts structured content from an HTML document.
///
/// Synchronous on purpose: the parsed DOM is not `Send` and must never be
/// held across an await point.
fn extract_page(url: &str, html: &str) -> Result<ScrapedPage, ScrapeError> {
    let document = Html::parse_document(html);

    let select_first = |css: &str| -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    };

    let select_meta = |css: &str| -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    };

    let title = select_meta("meta[property=\"og:title\"]")
        .or_else(|| select_first("title"))
        .unwrap_or_default();

    // Paragraph-level extraction; prefer the article element when present
    let paragraph_selector =
        Selector::parse("article p, main p, p").map_err(|e| {
            ScrapeError::ExtractionFailed(format!("selector: {}", e))
        })?;

    let mut paragraphs: Vec<String> = Vec::new();
    for element in document.select(&paragraph_selector) {
        let text = element.text().collect::<String>();
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.len() < MIN_PARAGRAPH_CHARS || is_boilerplate(&text) {
            continue;
        }
        if !paragraphs.contains(&text) {
            paragraphs.push(text);
        }
    }

    if paragraphs.is_empty() {
        return Err(ScrapeError::ExtractionFailed(format!(
            "No article paragraphs found at {}",
            url
        )));
    }

    let published_at = select_meta("meta[property=\"article:published_time\"]")
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let tags = select_meta("meta[name=\"keywords\"]")
        .map(|v| {
            v.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(ScrapedPage {
        url: url.to_string(),
        title,
        content: paragraphs.join("\n\n"),
        description: select_meta("meta[name=\"description\"]")
            .or_else(|| select_meta("meta[property=\"og:description\"]")),
        author: select_meta("meta[name=\"author\"]"),
        published_at,
        image_url: select_meta("meta[property=\"og:image\"]"),
        tags,
    })
}

#[async_trait]
impl Scraper for HttpScraper {
    #[instrument(name = "scrape", skip(self), fields(url = %url))]
    async fn scrape(&self, url: &str, budget: Duration) -> Result<ScrapedPage, ScrapeError> {
        let html = self.fetch(url, budget).await?;
        let page = extract_page(url, &html)?;
        debug!(content_len = page.content.len(), "Page scraped");
        Ok(page)
    }

    #[instrument(name = "scrape_many", skip(self, urls), fields(count = urls.len()))]
    async fn scrape_many(&self, urls: &[String]) -> ScrapeBatch {
        let results: Vec<(String, Result<ScrapedPage, ScrapeError>)> =
            stream::iter(urls.iter().cloned())
                .map(|url| async move {
                    let first = self.scrape(&url, SCRAPE_TIMEOUT).await;
                    match first {
                        Ok(page) => (url, Ok(page)),
                        Err(first_err) => {
                            warn!(url = %url, error = %first_err, "Scrape failed, retrying once");
                            let second = self.scrape(&url, SCRAPE_TIMEOUT).await;
                            (url, second)
                        }
                    }
                })
                .buffer_unordered(SCRAPE_CONCURRENCY)
                .collect()
                .await;

        let mut batch = ScrapeBatch::default();
        for (url, result) in results {
            match result {
                Ok(page) => batch.ok.push(page),
                Err(err) => batch.failed.push((url, err)),
            }
        }

        info!(
            ok = batch.ok.len(),
            failed = batch.failed.len(),
            "Batch scrape completed"
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html>
      <head>
        <title>Gas prices climb again</title>
        <meta name="description" content="Fuel costs rose for a third week.">
        <meta name="author" content="A. Reporter">
        <meta property="og:image" content="https://img.example/gas.jpg">
        <meta property="article:published_time" content="2025-06-01T08:00:00Z">
        <meta name="keywords" content="gas, energy, prices">
      </head>
      <body>
        <article>
          <p>Fuel prices across the country rose for the third consecutive week, driven by refinery outages.</p>
          <p>Subscribe to our newsletter for daily market updates delivered straight to your inbox.</p>
          <p>Analysts point to seasonal demand and a weaker dollar as the main contributors to the move.</p>
          <p>ok</p>
        </article>
      </body>
    </html>"#;

    #[test]
    fn test_extract_page_fields() {
        let page = extract_page("https://e.com/gas", PAGE).unwrap();
        assert_eq!(page.title, "Gas prices climb again");
        assert_eq!(page.description.as_deref(), Some("Fuel costs rose for a third week."));
        assert_eq!(page.author.as_deref(), Some("A. Reporter"));
        assert!(page.published_at.is_some());
        assert_eq!(page.tags, vec!["gas", "energy", "prices"]);
    }

    #[test]
    fn test_extract_drops_boilerplate_and_short_lines() {
        let page = extract_page("https://e.com/gas", PAGE).unwrap();
        assert!(page.content.contains("refinery outages"));
        assert!(page.content.contains("seasonal demand"));
        assert!(!page.content.contains("Subscribe"));
        assert!(!page.content.contains("\nok"));
    }

    #[test]
    fn test_extract_fails_without_paragraphs() {
        let html = "<html><head><title>Empty</title></head><body><div>nav</div></body></html>";
        let result = extract_page("https://e.com/empty", html);
        assert!(matches!(result, Err(ScrapeError::ExtractionFailed(_))));
    }

    #[test]
    fn test_is_boilerplate() {
        assert!(is_boilerplate("Subscribe to our newsletter today"));
        assert!(is_boilerplate("We use cookie banners"));
        assert!(!is_boilerplate("Prices rose sharply in June"));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let scraper = HttpScraper::new(Arc::new(reqwest::Client::new()));
        let result = scraper.scrape("ftp://example.com", SCRAPE_TIMEOUT).await;
        assert!(matches!(result, Err(ScrapeError::InvalidUrl(_))));

        let result = scraper.scrape("not a url", SCRAPE_TIMEOUT).await;
        assert!(matches!(result, Err(ScrapeError::InvalidUrl(_))));
    }

    #[test]
    fn test_error_kind_mapping() {
        let err: AgentError = ScrapeError::Timeout("https://e.com".to_string()).into();
        assert_eq!(err.kind, ErrorKind::Timeout);
        let err: AgentError = ScrapeError::InvalidUrl("x".to_string()).into();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
