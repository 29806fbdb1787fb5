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

//! YouTube Data API-style video search adapter.
//!
//! Search hits come from `/search`; statistics and duration are filled in
//! with a follow-up `/videos` call that degrades gracefully. Transcripts
//! are downloaded from the public timedtext endpoint and de-tagged.

use super::{SearchError, VideoSearch};
use crate::models::video::Video;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Caption download endpoint
const TIMEDTEXT_URL: &str = "https://video.google.com/timedtext";

/// Provider-side search page ceiling
pub const MAX_SEARCH_RESULTS: usize = 50;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("valid duration regex"));

// ============================================================================
// API response shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "channelId")]
    #[serde(default)]
    channel_id: String,
    #[serde(rename = "channelTitle")]
    #[serde(default)]
    channel_title: String,
    #[serde(rename = "publishedAt")]
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    thumbnails: Thumbnails,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    high: Option<Thumbnail>,
    #[serde(default)]
    medium: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(default)]
    statistics: Option<Statistics>,
    #[serde(rename = "contentDetails")]
    #[serde(default)]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct Statistics {
    #[serde(rename = "viewCount")]
    #[serde(default)]
    view_count: Option<String>,
    #[serde(rename = "likeCount")]
    #[serde(default)]
    like_count: Option<String>,
    #[serde(rename = "commentCount")]
    #[serde(default)]
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: Option<String>,
}

/// Parses an ISO-8601 duration like `PT5M30S` into seconds.
fn parse_duration_secs(duration: &str) -> u64 {
    let Some(captures) = DURATION_RE.captures(duration) else {
        return 0;
    };
    let get = |i: usize| -> u64 {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    get(1) * 3600 + get(2) * 60 + get(3)
}

/// Strips timedtext XML tags and decodes the common entities.
fn clean_transcript(raw: &str) -> String {
    let text = TAG_RE.replace_all(raw, " ");
    text.replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Video search over a YouTube Data API-compatible endpoint.
pub struct VideoApiClient {
    base_url: String,
    api_key: String,
    http_client: Arc<reqwest::Client>,
}

impl VideoApiClient {
    /// Creates a configured client with a shared HTTP client.
    pub fn new(base_url: &str, api_key: &str, http_client: Arc<reqwest::Client>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http_client,
        }
    }

    async fn search(&self, query: &str, max: usize) -> Result<Vec<Video>, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::NotConfigured("video search".to_string()));
        }

        let url = format!("{}/search", self.base_url);
        let max_results = max.min(MAX_SEARCH_RESULTS).to_string();
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::RequestFailed(format!(
                "Video API error ({}): {}",
                status,
                &body[..body.len().min(300)]
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        let mut videos: Vec<Video> = parsed
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                let snippet = item.snippet;
                let thumbnail = snippet
                    .thumbnails
                    .high
                    .or(snippet.thumbnails.medium)
                    .map(|t| t.url);
                let video = Video {
                    url: format!("https://www.youtube.com/watch?v={}", id),
                    id,
                    title: snippet.title,
                    description: snippet.description,
                    transcript: None,
                    channel_id: snippet.channel_id,
                    channel_name: snippet.channel_title,
                    thumbnail_url: thumbnail,
                    published_at: snippet.published_at,
                    tags: snippet.tags,
                    view_count: 0,
                    like_count: 0,
                    comment_count: 0,
                    duration_secs: 0,
                    relevancy_score: None,
                };
                video.is_valid().then_some(video)
            })
            .collect();

        // Statistics are a nice-to-have; search results stand on their own
        if let Err(e) = self.fill_details(&mut videos).await {
            warn!(error = %e, "Video detail lookup failed, keeping search results");
        }

        debug!(count = videos.len(), "Video search returned");
        Ok(videos)
    }

    async fn fill_details(&self, videos: &mut [Video]) -> Result<(), SearchError> {
        if videos.is_empty() {
            return Ok(());
        }

        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        let id_list = ids.join(",");
        let url = format!("{}/videos", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("part", "statistics,contentDetails"),
                ("id", id_list.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::RequestFailed(format!(
                "Video detail error ({})",
                response.status()
            )));
        }

        let parsed: VideosResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        let by_id: HashMap<String, VideoItem> =
            parsed.items.into_iter().map(|i| (i.id.clone(), i)).collect();

        for video in videos.iter_mut() {
            if let Some(item) = by_id.get(&video.id) {
                if let Some(stats) = &item.statistics {
                    let parse = |s: &Option<String>| {
                        s.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0)
                    };
                    video.view_count = parse(&stats.view_count);
                    video.like_count = parse(&stats.like_count);
                    video.comment_count = parse(&stats.comment_count);
                }
                if let Some(details) = &item.content_details {
                    if let Some(duration) = &details.duration {
                        video.duration_secs = parse_duration_secs(duration);
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VideoSearch for VideoApiClient {
    #[instrument(name = "video_search_keywords", skip(self), fields(keywords = keywords.len(), max = max))]
    async fn search_keywords(
        &self,
        keywords: &[String],
        max: usize,
    ) -> Result<Vec<Video>, SearchError> {
        let videos = self.search(&keywords.join(" "), max).await?;
        info!(count = videos.len(), "Keyword video search completed");
        Ok(videos)
    }

    #[instrument(name = "video_search_query", skip(self, query), fields(max = max))]
    async fn search_query(&self, query: &str, max: usize) -> Result<Vec<Video>, SearchError> {
        let videos = self.search(query, max).await?;
        info!(count = videos.len(), "Query video search completed");
        Ok(videos)
    }

    #[instrument(name = "video_transcript", skip(self))]
    async fn get_transcript(&self, video_id: &str) -> Result<String, SearchError> {
        let response = self
            .http_client
            .get(TIMEDTEXT_URL)
            .query(&[("lang", "en"), ("v", video_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::NoTranscript(video_id.to_string()));
        }

        let body = response.text().await?;
        let transcript = clean_transcript(&body);
        if transcript.is_empty() {
            return Err(SearchError::NoTranscript(video_id.to_string()));
        }

        debug!(chars = transcript.len(), "Transcript downloaded");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_secs("PT5M30S"), 330);
        assert_eq!(parse_duration_secs("PT1H2M3S"), 3723);
        assert_eq!(parse_duration_secs("PT45S"), 45);
        assert_eq!(parse_duration_secs("PT10M"), 600);
        assert_eq!(parse_duration_secs("garbage"), 0);
    }

    #[test]
    fn test_clean_transcript() {
        let raw = r#"<transcript><text start="0" dur="2">Hello &amp; welcome</text>
                     <text start="2" dur="3">to the show</text></transcript>"#;
        assert_eq!(clean_transcript(raw), "Hello & welcome to the show");
    }

    #[test]
    fn test_clean_transcript_empty_body() {
        assert_eq!(clean_transcript("<transcript></transcript>"), "");
    }

    #[test]
    fn test_search_response_parses() {
        let body = r#"{
            "items": [{
                "id": {"kind": "youtube#video", "videoId": "abc123"},
                "snippet": {
                    "title": "Gas prices explained",
                    "description": "Why fuel costs what it does",
                    "channelId": "chan1",
                    "channelTitle": "Market Watch",
                    "publishedAt": "2025-06-01T12:00:00Z",
                    "thumbnails": {"high": {"url": "https://img.example/t.jpg"}}
                }
            }]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].id.video_id.as_deref(), Some("abc123"));
        assert_eq!(parsed.items[0].snippet.channel_title, "Market Watch");
    }

    #[test]
    fn test_videos_response_parses_statistics() {
        let body = r#"{
            "items": [{
                "id": "abc123",
                "statistics": {"viewCount": "1200", "likeCount": "34"},
                "contentDetails": {"duration": "PT4M10S"}
            }]
        }"#;
        let parsed: VideosResponse = serde_json::from_str(body).unwrap();
        let item = &parsed.items[0];
        assert_eq!(
            item.statistics.as_ref().unwrap().view_count.as_deref(),
            Some("1200")
        );
        assert_eq!(
            item.content_details.as_ref().unwrap().duration.as_deref(),
            Some("PT4M10S")
        );
    }

    #[tokio::test]
    async fn test_unconfigured_client_errors() {
        let client = VideoApiClient::new(
            "https://videos.example/v3",
            "",
            Arc::new(reqwest::Client::new()),
        );
        let result = client.search_query("gas", 10).await;
        assert!(matches!(result, Err(SearchError::NotConfigured(_))));
    }
}
