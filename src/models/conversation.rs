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

//! Persistent per-user dialogue state.
//!
//! A [`ConversationContext`] survives across workflows (7 days past last
//! activity). During a workflow a snapshot is copied into the workflow
//! context; the merged result is written back after the pipeline completes.
//! The `exchanges` list is the source of truth; the `last_*` fields are
//! denormalized on append.

use super::workflow::{Intent, UserPreferences};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum tracked discussion topics (least-recent evicted)
pub const MAX_CURRENT_TOPICS: usize = 10;

/// Maximum tracked recent keywords (LRU evicted)
pub const MAX_RECENT_KEYWORDS: usize = 20;

/// One committed (user query, assistant response) pair.
///
/// Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationExchange {
    /// Exchange id
    pub id: String,
    /// Commit time
    pub timestamp: DateTime<Utc>,
    /// The user's query
    pub user_query: String,
    /// The assistant's final response
    pub assistant_response: String,
    /// Intent the query was classified as
    pub intent: Intent,
    /// Topics this exchange was about
    #[serde(default)]
    pub key_topics: Vec<String>,
    /// Named entities mentioned
    #[serde(default)]
    pub key_entities: Vec<String>,
    /// Search keywords used
    #[serde(default)]
    pub keywords: Vec<String>,
    /// End-to-end processing duration
    pub processing_time_ms: u64,
}

impl ConversationExchange {
    /// Creates a new exchange stamped with a fresh id and the current time.
    pub fn new(user_query: String, assistant_response: String, intent: Intent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            user_query,
            assistant_response,
            intent,
            key_topics: Vec::new(),
            key_entities: Vec::new(),
            keywords: Vec::new(),
            processing_time_ms: 0,
        }
    }
}

/// Per-user persistent dialogue state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Owning user
    pub user_id: String,
    /// When the session was first created
    pub session_started: DateTime<Utc>,
    /// Last user activity
    pub last_active: DateTime<Utc>,
    /// Last persisted write
    pub updated_at: DateTime<Utc>,

    /// Committed exchanges, append-only within a session
    #[serde(default)]
    pub exchanges: Vec<ConversationExchange>,

    /// Active discussion topics, capacity [`MAX_CURRENT_TOPICS`]
    #[serde(default)]
    pub current_topics: Vec<String>,
    /// Recently used keywords, capacity [`MAX_RECENT_KEYWORDS`], LRU order
    #[serde(default)]
    pub recent_keywords: Vec<String>,

    /// Denormalized from the last appended exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_query: Option<String>,
    /// Denormalized from the last appended exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_response: Option<String>,
    /// Denormalized from the last appended exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_intent: Option<Intent>,
    /// Topic referenced by the most recent follow-up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_referenced_topic: Option<String>,
    /// Most recent multi-source summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_summary: Option<String>,

    /// Short running description of the conversation
    #[serde(default)]
    pub context_summary: String,
    /// Messages seen this session (user + assistant)
    pub message_count: u64,
    /// Exchanges committed over the lifetime of the context
    pub total_exchanges: u64,
    /// Presentation preferences, refreshed from each request
    pub preferences: UserPreferences,
}

impl ConversationContext {
    /// Creates an empty context for a first-time user.
    pub fn new(user_id: String, preferences: UserPreferences) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            session_started: now,
            last_active: now,
            updated_at: now,
            exchanges: Vec::new(),
            current_topics: Vec::new(),
            recent_keywords: Vec::new(),
            last_query: None,
            last_response: None,
            last_intent: None,
            last_referenced_topic: None,
            last_summary: None,
            context_summary: String::new(),
            message_count: 0,
            total_exchanges: 0,
            preferences,
        }
    }

    /// Refreshes activity timestamps and preferences at the start of a turn.
    pub fn touch(&mut self, preferences: &UserPreferences) {
        self.last_active = Utc::now();
        self.preferences = preferences.clone();
    }

    /// Commits an exchange: appends it, updates the denormalized fields,
    /// merges topics and keywords under their LRU caps, and refreshes the
    /// running summary.
    pub fn append_exchange(&mut self, exchange: ConversationExchange) {
        self.last_query = Some(exchange.user_query.clone());
        self.last_response = Some(exchange.assistant_response.clone());
        self.last_intent = Some(exchange.intent);

        for topic in &exchange.key_topics {
            self.push_topic(topic);
        }
        for keyword in &exchange.keywords {
            self.push_keyword(keyword);
        }

        self.exchanges.push(exchange);
        self.message_count += 2;
        self.total_exchanges += 1;
        self.last_active = Utc::now();
        self.refresh_summary();
    }

    /// Tracks a topic, evicting the least-recent past the cap.
    pub fn push_topic(&mut self, topic: &str) {
        let topic = topic.trim();
        if topic.is_empty() {
            return;
        }
        self.current_topics
            .retain(|t| !t.eq_ignore_ascii_case(topic));
        self.current_topics.push(topic.to_string());
        while self.current_topics.len() > MAX_CURRENT_TOPICS {
            self.current_topics.remove(0);
        }
    }

    /// Tracks a keyword in LRU order, evicting past the cap.
    pub fn push_keyword(&mut self, keyword: &str) {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return;
        }
        self.recent_keywords
            .retain(|k| !k.eq_ignore_ascii_case(keyword));
        self.recent_keywords.push(keyword.to_string());
        while self.recent_keywords.len() > MAX_RECENT_KEYWORDS {
            self.recent_keywords.remove(0);
        }
    }

    /// The most recent `n` exchanges, oldest first.
    pub fn recent_exchanges(&self, n: usize) -> &[ConversationExchange] {
        let start = self.exchanges.len().saturating_sub(n);
        &self.exchanges[start..]
    }

    /// Finds an exchange by id.
    pub fn exchange_by_id(&self, id: &str) -> Option<&ConversationExchange> {
        self.exchanges.iter().find(|e| e.id == id)
    }

    /// Recomputes the running context summary from recent topics and the
    /// last multi-source summary. Local only, no LLM call.
    fn refresh_summary(&mut self) {
        let topics = if self.current_topics.is_empty() {
            "general conversation".to_string()
        } else {
            self.current_topics.join(", ")
        };
        self.context_summary = match &self.last_summary {
            Some(summary) => format!(
                "Discussing: {}. Latest briefing: {}",
                topics,
                truncate(summary, 240)
            ),
            None => format!("Discussing: {}", topics),
        };
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ConversationContext {
        ConversationContext::new("user_1".to_string(), UserPreferences::default())
    }

    fn exchange(query: &str, response: &str) -> ConversationExchange {
        ConversationExchange::new(query.to_string(), response.to_string(), Intent::Chitchat)
    }

    #[test]
    fn test_new_context_is_empty() {
        let ctx = ctx();
        assert!(ctx.exchanges.is_empty());
        assert_eq!(ctx.message_count, 0);
        assert_eq!(ctx.total_exchanges, 0);
        assert!(ctx.last_query.is_none());
    }

    #[test]
    fn test_append_updates_denormalized_fields() {
        let mut ctx = ctx();
        ctx.append_exchange(exchange("hello", "hi there"));

        assert_eq!(ctx.exchanges.len(), 1);
        assert_eq!(ctx.last_query.as_deref(), Some("hello"));
        assert_eq!(ctx.last_response.as_deref(), Some("hi there"));
        assert_eq!(ctx.last_intent, Some(Intent::Chitchat));
        assert_eq!(ctx.message_count, 2);
        assert_eq!(ctx.total_exchanges, 1);
    }

    #[test]
    fn test_topic_cap_evicts_least_recent() {
        let mut ctx = ctx();
        for i in 0..12 {
            ctx.push_topic(&format!("topic-{}", i));
        }
        assert_eq!(ctx.current_topics.len(), MAX_CURRENT_TOPICS);
        assert_eq!(ctx.current_topics.first().unwrap(), "topic-2");
        assert_eq!(ctx.current_topics.last().unwrap(), "topic-11");
    }

    #[test]
    fn test_keyword_lru_moves_repeats_to_back() {
        let mut ctx = ctx();
        ctx.push_keyword("tesla");
        ctx.push_keyword("earnings");
        ctx.push_keyword("Tesla");
        assert_eq!(ctx.recent_keywords, vec!["earnings", "Tesla"]);
    }

    #[test]
    fn test_keyword_cap() {
        let mut ctx = ctx();
        for i in 0..25 {
            ctx.push_keyword(&format!("kw-{}", i));
        }
        assert_eq!(ctx.recent_keywords.len(), MAX_RECENT_KEYWORDS);
        assert_eq!(ctx.recent_keywords.first().unwrap(), "kw-5");
    }

    #[test]
    fn test_recent_exchanges_window() {
        let mut ctx = ctx();
        for i in 0..5 {
            ctx.append_exchange(exchange(&format!("q{}", i), &format!("a{}", i)));
        }
        let recent = ctx.recent_exchanges(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].user_query, "q2");
        assert_eq!(recent[2].user_query, "q4");

        // Asking for more than exist returns everything
        assert_eq!(ctx.recent_exchanges(100).len(), 5);
    }

    #[test]
    fn test_exchange_by_id() {
        let mut ctx = ctx();
        let e = exchange("q", "a");
        let id = e.id.clone();
        ctx.append_exchange(e);

        assert!(ctx.exchange_by_id(&id).is_some());
        assert!(ctx.exchange_by_id("missing").is_none());
    }

    #[test]
    fn test_summary_mentions_topics() {
        let mut ctx = ctx();
        let mut e = exchange("tesla news?", "Tesla reported earnings.");
        e.key_topics = vec!["Tesla Q3 earnings".to_string()];
        ctx.append_exchange(e);

        assert!(ctx.context_summary.contains("Tesla Q3 earnings"));
    }

    #[test]
    fn test_round_trip() {
        let mut ctx = ctx();
        ctx.append_exchange(exchange("q", "a"));
        let json = serde_json::to_string(&ctx).unwrap();
        let back: ConversationContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }
}
