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

//! Workflow types: the per-request aggregate, its lifecycle status, user
//! preferences and processing telemetry.
//!
//! A [`WorkflowContext`] is created at submission, mutated only by the owning
//! executor, and sealed exactly once when it reaches a terminal status.

use super::conversation::ConversationContext;
use super::news::NewsArticle;
use super::progress::AgentStatus;
use super::video::Video;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Workflow lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created but not yet picked up by the executor
    Pending,
    /// Pipeline is running
    Processing,
    /// Pipeline finished successfully
    Completed,
    /// Pipeline aborted with an error
    Failed,
    /// Cancelled by an external request
    Cancelled,
    /// Outer deadline elapsed
    Timeout,
}

impl WorkflowStatus {
    /// Returns true for statuses that seal the workflow context.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed
                | WorkflowStatus::Failed
                | WorkflowStatus::Cancelled
                | WorkflowStatus::Timeout
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Pending => write!(f, "pending"),
            WorkflowStatus::Processing => write!(f, "processing"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Cancelled => write!(f, "cancelled"),
            WorkflowStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// Classified user intent, selecting the pipeline branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// A fresh news question requiring retrieval
    NewNewsQuery,
    /// A follow-up on a previous exchange
    FollowUpDiscussion,
    /// Casual conversation, no retrieval
    Chitchat,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::NewNewsQuery => write!(f, "new_news_query"),
            Intent::FollowUpDiscussion => write!(f, "follow_up_discussion"),
            Intent::Chitchat => write!(f, "chitchat"),
        }
    }
}

impl std::str::FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new_news_query" | "news" | "news_query" => Ok(Intent::NewNewsQuery),
            "follow_up_discussion" | "follow_up" | "followup" => Ok(Intent::FollowUpDiscussion),
            "chitchat" | "chit_chat" | "casual" => Ok(Intent::Chitchat),
            other => Err(format!("Unknown intent: {}", other)),
        }
    }
}

/// Preferred length of the final response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseLength {
    /// A couple of sentences
    Brief,
    /// A short multi-paragraph answer
    #[default]
    Moderate,
    /// A thorough answer
    Detailed,
}

/// Per-user presentation preferences carried on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Personality voice tag (one of the six presets)
    #[serde(default = "default_personality")]
    pub personality: String,
    /// Topics the user cares about
    #[serde(default)]
    pub favorite_topics: Vec<String>,
    /// Preferred response length
    #[serde(default)]
    pub response_length: ResponseLength,
}

fn default_personality() -> String {
    "friendly-explainer".to_string()
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            personality: default_personality(),
            favorite_topics: Vec::new(),
            response_length: ResponseLength::default(),
        }
    }
}

/// Aggregate counters collected while a workflow runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Outbound collaborator calls made
    pub api_calls: u32,
    /// Fresh articles returned by retrieval
    pub articles_found: u32,
    /// Articles surviving the relevance ranker
    pub articles_filtered: u32,
    /// Fresh videos returned by retrieval
    pub videos_found: u32,
    /// Videos surviving the relevance ranker
    pub videos_filtered: u32,
    /// Embedding vectors generated
    pub embeddings_generated: u32,
    /// Conversation/vector cache hits
    pub cache_hits: u32,
}

/// Outcome of a single stage, kept in the per-stage map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Terminal status of the stage
    pub status: AgentStatus,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Incoming execution request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    /// Owning user
    pub user_id: String,
    /// The natural-language query
    pub query: String,
    /// Client-provided workflow id; generated when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    /// Presentation preferences
    #[serde(default)]
    pub user_preferences: UserPreferences,
}

/// Final response returned to the submitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResponse {
    /// Workflow id (client-provided or generated)
    pub workflow_id: String,
    /// Server-generated request id
    pub request_id: String,
    /// Terminal status string
    pub status: String,
    /// Human-readable answer or error message
    pub message: String,
    /// Total elapsed milliseconds
    pub total_time_ms: u64,
}

/// The per-request aggregate owned by the workflow executor.
///
/// Everything a pipeline stage reads or writes lives here; fan-out children
/// return values that the executor merges back at the join point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// Workflow id (client-provided or generated)
    pub workflow_id: String,
    /// Server-generated request id
    pub request_id: String,
    /// Owning user
    pub user_id: String,
    /// Submission time
    pub started_at: DateTime<Utc>,
    /// Seal time; set iff status is terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Lifecycle status
    pub status: WorkflowStatus,

    /// Original query, immutable after construction
    pub original_query: String,
    /// Rewritten short-form query, set once by the enhancer or classifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_query: Option<String>,
    /// Presentation preferences
    pub preferences: UserPreferences,

    /// Classified intent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    /// Classifier confidence in [0, 1]
    pub intent_confidence: f64,
    /// True when the query references a prior exchange
    pub is_follow_up: bool,
    /// Topic of the referenced exchange; non-empty when is_follow_up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_topic: Option<String>,
    /// Id of the referenced exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_exchange_id: Option<String>,

    /// Ordered, de-duplicated search keywords
    pub keywords: Vec<String>,
    /// Candidate articles
    pub articles: Vec<NewsArticle>,
    /// Candidate videos
    pub videos: Vec<Video>,
    /// Embedding of the enhanced (or original) query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_embedding: Option<Vec<f32>>,

    /// Multi-source summary before styling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Personality-styled final answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_response: Option<String>,

    /// Snapshot of the user's conversation, merged back on success
    pub conversation: ConversationContext,

    /// Per-stage outcome map
    pub stage_records: HashMap<String, StageRecord>,
    /// Aggregate counters
    pub stats: ProcessingStats,
    /// Free-form bag for fan-out intermediates, written only at joins
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkflowContext {
    /// Builds a pending context from a request, generating ids as needed.
    pub fn from_request(request: &WorkflowRequest) -> Self {
        let workflow_id = request
            .workflow_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            workflow_id,
            request_id: Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            started_at: Utc::now(),
            ended_at: None,
            status: WorkflowStatus::Pending,
            original_query: request.query.clone(),
            enhanced_query: None,
            preferences: request.user_preferences.clone(),
            intent: None,
            intent_confidence: 0.0,
            is_follow_up: false,
            referenced_topic: None,
            referenced_exchange_id: None,
            keywords: Vec::new(),
            articles: Vec::new(),
            videos: Vec::new(),
            query_embedding: None,
            summary: None,
            final_response: None,
            conversation: ConversationContext::new(
                request.user_id.clone(),
                request.user_preferences.clone(),
            ),
            stage_records: HashMap::new(),
            stats: ProcessingStats::default(),
            metadata: HashMap::new(),
        }
    }

    /// The query retrieval should run against: enhanced when present.
    pub fn effective_query(&self) -> &str {
        self.enhanced_query.as_deref().unwrap_or(&self.original_query)
    }

    /// Appends keywords, preserving insertion order and dropping repeats
    /// (case-insensitive).
    pub fn add_keywords<I, S>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for keyword in keywords {
            let keyword = keyword.into();
            let trimmed = keyword.trim();
            if trimmed.is_empty() {
                continue;
            }
            let exists = self
                .keywords
                .iter()
                .any(|k| k.eq_ignore_ascii_case(trimmed));
            if !exists {
                self.keywords.push(trimmed.to_string());
            }
        }
    }

    /// Records a stage outcome in the per-stage map.
    pub fn record_stage(&mut self, stage: &str, status: AgentStatus, duration_ms: u64) {
        self.stage_records
            .insert(stage.to_string(), StageRecord { status, duration_ms });
    }

    /// Transitions to a terminal status and stamps the end time.
    ///
    /// Sealing twice is a no-op; the first terminal status wins.
    pub fn seal(&mut self, status: WorkflowStatus) {
        debug_assert!(status.is_terminal());
        if self.ended_at.is_some() {
            return;
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    /// Milliseconds between start and seal (or now, when still running).
    pub fn total_time_ms(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> WorkflowRequest {
        WorkflowRequest {
            user_id: "user_1".to_string(),
            query: "Why are US gas prices rising?".to_string(),
            workflow_id: None,
            user_preferences: UserPreferences::default(),
        }
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Timeout).unwrap(),
            "\"timeout\""
        );
    }

    #[test]
    fn test_status_terminal() {
        assert!(!WorkflowStatus::Pending.is_terminal());
        assert!(!WorkflowStatus::Processing.is_terminal());
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert!(WorkflowStatus::Timeout.is_terminal());
    }

    #[test]
    fn test_intent_parsing() {
        assert_eq!(
            "new_news_query".parse::<Intent>().unwrap(),
            Intent::NewNewsQuery
        );
        assert_eq!(
            "Follow_Up".parse::<Intent>().unwrap(),
            Intent::FollowUpDiscussion
        );
        assert_eq!("chitchat".parse::<Intent>().unwrap(), Intent::Chitchat);
        assert!("weather".parse::<Intent>().is_err());
    }

    #[test]
    fn test_from_request_generates_ids() {
        let ctx = WorkflowContext::from_request(&request());
        assert!(!ctx.workflow_id.is_empty());
        assert!(!ctx.request_id.is_empty());
        assert_eq!(ctx.status, WorkflowStatus::Pending);
        assert!(ctx.ended_at.is_none());
    }

    #[test]
    fn test_from_request_keeps_client_workflow_id() {
        let mut req = request();
        req.workflow_id = Some("wf_client".to_string());
        let ctx = WorkflowContext::from_request(&req);
        assert_eq!(ctx.workflow_id, "wf_client");
    }

    #[test]
    fn test_effective_query_prefers_enhanced() {
        let mut ctx = WorkflowContext::from_request(&request());
        assert_eq!(ctx.effective_query(), "Why are US gas prices rising?");
        ctx.enhanced_query = Some("gas prices US".to_string());
        assert_eq!(ctx.effective_query(), "gas prices US");
    }

    #[test]
    fn test_add_keywords_dedupes_preserving_order() {
        let mut ctx = WorkflowContext::from_request(&request());
        ctx.add_keywords(["gas", "prices", "Gas", "  ", "inflation", "prices"]);
        assert_eq!(ctx.keywords, vec!["gas", "prices", "inflation"]);
    }

    #[test]
    fn test_seal_is_idempotent() {
        let mut ctx = WorkflowContext::from_request(&request());
        ctx.seal(WorkflowStatus::Completed);
        let first_end = ctx.ended_at;
        assert!(first_end.is_some());

        ctx.seal(WorkflowStatus::Failed);
        assert_eq!(ctx.status, WorkflowStatus::Completed);
        assert_eq!(ctx.ended_at, first_end);
    }

    #[test]
    fn test_total_time_after_seal() {
        let mut ctx = WorkflowContext::from_request(&request());
        ctx.seal(WorkflowStatus::Completed);
        let end = ctx.ended_at.expect("sealed");
        let expected = (end - ctx.started_at).num_milliseconds() as u64;
        assert_eq!(ctx.total_time_ms(), expected);
    }

    #[test]
    fn test_default_preferences() {
        let prefs = UserPreferences::default();
        assert_eq!(prefs.personality, "friendly-explainer");
        assert!(prefs.favorite_topics.is_empty());
        assert_eq!(prefs.response_length, ResponseLength::Moderate);
    }

    #[test]
    fn test_context_round_trip() {
        let ctx = WorkflowContext::from_request(&request());
        let json = serde_json::to_string(&ctx).unwrap();
        let back: WorkflowContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back.workflow_id, ctx.workflow_id);
        assert_eq!(back.original_query, ctx.original_query);
        assert_eq!(back.status, WorkflowStatus::Pending);
    }
}
