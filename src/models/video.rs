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

//! Video model for the video retrieval arm of the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum transcript length kept on a video, in words.
pub const MAX_TRANSCRIPT_WORDS: usize = 2500;

/// A video candidate flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    /// Provider video id
    pub id: String,
    /// Video title
    pub title: String,
    /// Provider description
    #[serde(default)]
    pub description: String,
    /// Caption transcript or LLM fallback summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// Channel id
    pub channel_id: String,
    /// Channel display name
    pub channel_name: String,
    /// Thumbnail image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Publication time, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Watch URL
    pub url: String,
    /// Provider tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// View count
    #[serde(default)]
    pub view_count: u64,
    /// Like count
    #[serde(default)]
    pub like_count: u64,
    /// Comment count
    #[serde(default)]
    pub comment_count: u64,
    /// Duration in seconds
    #[serde(default)]
    pub duration_secs: u64,
    /// Ranker-assigned relevancy in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevancy_score: Option<f64>,
}

impl Video {
    /// Candidates with an empty title or URL never enter the context.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }

    /// Text used for embedding generation.
    pub fn embedding_text(&self) -> String {
        format!("{} - {}", self.title, self.description)
    }

    /// Stores a transcript trimmed to [`MAX_TRANSCRIPT_WORDS`].
    pub fn set_transcript(&mut self, transcript: &str) {
        let words: Vec<&str> = transcript.split_whitespace().collect();
        let trimmed = if words.len() > MAX_TRANSCRIPT_WORDS {
            words[..MAX_TRANSCRIPT_WORDS].join(" ")
        } else {
            words.join(" ")
        };
        self.transcript = Some(trimmed);
    }
}
