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

//! Progress streaming: canonical branch tables, the progress fraction, the
//! per-user event bus and the per-workflow emitter.
//!
//! The progress fraction is a pure function of (branch, stage, status)
//! computed from the canonical tables below, never from stage-local
//! counters, so concurrent siblings cannot drift.

use crate::error::AgentError;
use crate::models::progress::{AgentStatus, AgentUpdate};
use crate::models::workflow::{Intent, WorkflowContext};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

/// Per-user stream capacity; oldest events are dropped past this
pub const STREAM_CAPACITY: usize = 1024;

/// Stage names, shared by the emitter and the stage implementations.
pub mod stage {
    /// Conversation memory load
    pub const MEMORY: &str = "memory";
    /// Intent classification
    pub const CLASSIFIER: &str = "intent_classifier";
    /// Query expansion
    pub const QUERY_ENHANCER: &str = "query_enhancer";
    /// Keyword extraction
    pub const KEYWORD_EXTRACTOR: &str = "keyword_extractor";
    /// News retrieval arm
    pub const NEWS_FETCH: &str = "news_fetch";
    /// Video retrieval arm
    pub const VIDEO_FETCH: &str = "video_fetch";
    /// Embedding fan-out
    pub const EMBEDDING_GENERATOR: &str = "embedding_generator";
    /// Vector collection write
    pub const VECTOR_STORE_WRITE: &str = "vector_store_write";
    /// Relevance ranking
    pub const RELEVANCE_RANKER: &str = "relevance_ranker";
    /// Article body scraping
    pub const SCRAPE_ENRICHER: &str = "scrape_enricher";
    /// Multi-source summary
    pub const SYNTHESIZER: &str = "synthesizer";
    /// Personality styling
    pub const PERSONALITY_STYLIZER: &str = "personality_stylizer";
    /// Follow-up reply
    pub const CONTEXTUAL_RESPONDER: &str = "contextual_responder";
    /// Casual reply
    pub const CHITCHAT_RESPONDER: &str = "chitchat_responder";
}

/// News branch stage order
pub const NEWS_BRANCH: [&str; 12] = [
    stage::MEMORY,
    stage::CLASSIFIER,
    stage::QUERY_ENHANCER,
    stage::KEYWORD_EXTRACTOR,
    stage::NEWS_FETCH,
    stage::VIDEO_FETCH,
    stage::EMBEDDING_GENERATOR,
    stage::VECTOR_STORE_WRITE,
    stage::RELEVANCE_RANKER,
    stage::SCRAPE_ENRICHER,
    stage::SYNTHESIZER,
    stage::PERSONALITY_STYLIZER,
];

/// Follow-up branch stage order
pub const FOLLOW_UP_BRANCH: [&str; 3] = [
    stage::MEMORY,
    stage::CLASSIFIER,
    stage::CONTEXTUAL_RESPONDER,
];

/// Chitchat branch stage order
pub const CHITCHAT_BRANCH: [&str; 3] = [
    stage::MEMORY,
    stage::CLASSIFIER,
    stage::CHITCHAT_RESPONDER,
];

/// Canonical stage list for a branch.
pub fn branch_stages(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::NewNewsQuery => &NEWS_BRANCH,
        Intent::FollowUpDiscussion => &FOLLOW_UP_BRANCH,
        Intent::Chitchat => &CHITCHAT_BRANCH,
    }
}

/// Computes the progress fraction for a stage event.
///
/// `processing` lands mid-stage, `completed` at the stage boundary, and
/// `failed` falls back to the stage start.
pub fn progress_fraction(intent: Intent, stage_name: &str, status: AgentStatus) -> f64 {
    let stages = branch_stages(intent);
    let total = stages.len() as f64;
    let Some(index) = stages.iter().position(|s| *s == stage_name) else {
        warn!(stage = stage_name, branch = %intent, "Stage missing from branch table");
        return 0.0;
    };
    let index = index as f64;

    match status {
        AgentStatus::Completed | AgentStatus::Skipped => (index + 1.0) / total,
        AgentStatus::Failed | AgentStatus::Timeout => index / total,
        _ => (index + 0.5) / total,
    }
}

struct UserStream {
    buffer: VecDeque<AgentUpdate>,
    sender: broadcast::Sender<AgentUpdate>,
}

impl UserStream {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            buffer: VecDeque::new(),
            sender,
        }
    }
}

/// Append-only, per-user progress streams.
///
/// Concurrent producers are allowed; per-stream ordering is the publish
/// order. The retained history is capped at [`STREAM_CAPACITY`] with the
/// oldest events dropped first.
pub struct ProgressBus {
    streams: Mutex<HashMap<String, UserStream>>,
}

impl ProgressBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Appends an event to the user's stream and fans it out to live
    /// subscribers.
    pub async fn publish(&self, user_id: &str, event: AgentUpdate) {
        let mut streams = self.streams.lock().await;
        let stream = streams
            .entry(user_id.to_string())
            .or_insert_with(UserStream::new);

        if stream.buffer.len() >= STREAM_CAPACITY {
            stream.buffer.pop_front();
        }
        stream.buffer.push_back(event.clone());

        // A send error only means nobody is tailing right now
        let _ = stream.sender.send(event);
    }

    /// The retained history for a user, oldest first.
    pub async fn history(&self, user_id: &str) -> Vec<AgentUpdate> {
        let streams = self.streams.lock().await;
        streams
            .get(user_id)
            .map(|s| s.buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// History plus a live receiver for subsequent events.
    pub async fn subscribe(
        &self,
        user_id: &str,
    ) -> (Vec<AgentUpdate>, broadcast::Receiver<AgentUpdate>) {
        let mut streams = self.streams.lock().await;
        let stream = streams
            .entry(user_id.to_string())
            .or_insert_with(UserStream::new);
        (
            stream.buffer.iter().cloned().collect(),
            stream.sender.subscribe(),
        )
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-workflow event emitter.
///
/// Owns the workflow identity and the branch the pipeline settled on;
/// stages call it at entry and exit.
pub struct ProgressEmitter {
    bus: Arc<ProgressBus>,
    user_id: String,
    workflow_id: String,
    request_id: String,
    branch: std::sync::Mutex<Intent>,
}

impl ProgressEmitter {
    /// Creates an emitter for a workflow. Until classification, events are
    /// computed against the news branch table (the longest one).
    pub fn new(bus: Arc<ProgressBus>, context: &WorkflowContext) -> Self {
        Self {
            bus,
            user_id: context.user_id.clone(),
            workflow_id: context.workflow_id.clone(),
            request_id: context.request_id.clone(),
            branch: std::sync::Mutex::new(Intent::NewNewsQuery),
        }
    }

    /// Fixes the branch once the classifier has decided.
    pub fn set_branch(&self, intent: Intent) {
        *self.branch.lock().expect("branch lock poisoned") = intent;
    }

    fn current_branch(&self) -> Intent {
        *self.branch.lock().expect("branch lock poisoned")
    }

    /// Publishes a pre-built envelope event (started/completed/error).
    pub async fn publish(&self, event: AgentUpdate) {
        self.bus.publish(&self.user_id, event).await;
    }

    /// Stage entry event.
    pub async fn stage_processing(&self, stage_name: &str, message: impl Into<String>) {
        let branch = self.current_branch();
        let event = AgentUpdate::agent(
            &self.workflow_id,
            &self.request_id,
            stage_name,
            AgentStatus::Processing,
            message.into(),
            progress_fraction(branch, stage_name, AgentStatus::Processing),
            branch,
        );
        debug!(stage = stage_name, progress = event.progress, "Stage processing");
        self.publish(event).await;
    }

    /// Stage success event.
    pub async fn stage_completed(
        &self,
        stage_name: &str,
        message: impl Into<String>,
        duration_ms: u64,
    ) {
        let branch = self.current_branch();
        let event = AgentUpdate::agent(
            &self.workflow_id,
            &self.request_id,
            stage_name,
            AgentStatus::Completed,
            message.into(),
            progress_fraction(branch, stage_name, AgentStatus::Completed),
            branch,
        )
        .with_duration(duration_ms);
        self.publish(event).await;
    }

    /// Stage failure event. Used both for fatal failures and for optional
    /// stages whose error is recovered.
    pub async fn stage_failed(&self, stage_name: &str, error: &AgentError, duration_ms: u64) {
        let branch = self.current_branch();
        let mut event = AgentUpdate::agent(
            &self.workflow_id,
            &self.request_id,
            stage_name,
            AgentStatus::Failed,
            format!("{} failed: {}", stage_name, error),
            progress_fraction(branch, stage_name, AgentStatus::Failed),
            branch,
        )
        .with_duration(duration_ms);
        event.error = Some(error.to_string());
        event.retryable = error.retryable;
        self.publish(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::{UserPreferences, WorkflowRequest};

    fn context() -> WorkflowContext {
        WorkflowContext::from_request(&WorkflowRequest {
            user_id: "user_1".to_string(),
            query: "gas?".to_string(),
            workflow_id: None,
            user_preferences: UserPreferences::default(),
        })
    }

    #[test]
    fn test_branch_lengths() {
        assert_eq!(NEWS_BRANCH.len(), 12);
        assert_eq!(FOLLOW_UP_BRANCH.len(), 3);
        assert_eq!(CHITCHAT_BRANCH.len(), 3);
    }

    #[test]
    fn test_progress_fraction_values() {
        // First news stage
        let p = progress_fraction(Intent::NewNewsQuery, stage::MEMORY, AgentStatus::Processing);
        assert!((p - 0.5 / 12.0).abs() < 1e-9);
        let p = progress_fraction(Intent::NewNewsQuery, stage::MEMORY, AgentStatus::Completed);
        assert!((p - 1.0 / 12.0).abs() < 1e-9);
        let p = progress_fraction(Intent::NewNewsQuery, stage::MEMORY, AgentStatus::Failed);
        assert_eq!(p, 0.0);

        // Last news stage completes the branch
        let p = progress_fraction(
            Intent::NewNewsQuery,
            stage::PERSONALITY_STYLIZER,
            AgentStatus::Completed,
        );
        assert!((p - 1.0).abs() < 1e-9);

        // Chitchat responder is the third of three
        let p = progress_fraction(Intent::Chitchat, stage::CHITCHAT_RESPONDER, AgentStatus::Processing);
        assert!((p - 2.5 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_stage_yields_zero() {
        assert_eq!(
            progress_fraction(Intent::Chitchat, "nonexistent", AgentStatus::Completed),
            0.0
        );
    }

    #[tokio::test]
    async fn test_bus_preserves_order() {
        let bus = ProgressBus::new();
        for i in 0..5 {
            let mut event = AgentUpdate::workflow_started("wf", "req");
            event.message = format!("event-{}", i);
            bus.publish("user_a", event).await;
        }

        let history = bus.history("user_a").await;
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].message, "event-0");
        assert_eq!(history[4].message, "event-4");
    }

    #[tokio::test]
    async fn test_bus_caps_and_drops_oldest() {
        let bus = ProgressBus::new();
        for i in 0..(STREAM_CAPACITY + 10) {
            let mut event = AgentUpdate::workflow_started("wf", "req");
            event.message = format!("event-{}", i);
            bus.publish("user_b", event).await;
        }

        let history = bus.history("user_b").await;
        assert_eq!(history.len(), STREAM_CAPACITY);
        assert_eq!(history[0].message, "event-10");
    }

    #[tokio::test]
    async fn test_bus_streams_are_per_user() {
        let bus = ProgressBus::new();
        bus.publish("user_c", AgentUpdate::workflow_started("wf1", "r1"))
            .await;

        assert_eq!(bus.history("user_c").await.len(), 1);
        assert!(bus.history("user_d").await.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_receives_live_events() {
        let bus = Arc::new(ProgressBus::new());
        let (history, mut rx) = bus.subscribe("user_e").await;
        assert!(history.is_empty());

        bus.publish("user_e", AgentUpdate::workflow_started("wf", "req"))
            .await;

        let received = rx.recv().await.expect("live event");
        assert_eq!(received.workflow_id, "wf");
    }

    #[tokio::test]
    async fn test_emitter_progress_monotonic_for_chitchat() {
        let bus = Arc::new(ProgressBus::new());
        let ctx = context();
        let emitter = ProgressEmitter::new(bus.clone(), &ctx);

        emitter.stage_processing(stage::MEMORY, "loading").await;
        emitter.stage_completed(stage::MEMORY, "loaded", 2).await;
        emitter.stage_processing(stage::CLASSIFIER, "classifying").await;
        emitter.set_branch(Intent::Chitchat);
        emitter.stage_completed(stage::CLASSIFIER, "chitchat", 8).await;
        emitter
            .stage_processing(stage::CHITCHAT_RESPONDER, "replying")
            .await;
        emitter
            .stage_completed(stage::CHITCHAT_RESPONDER, "replied", 15)
            .await;

        let history = bus.history(&ctx.user_id).await;
        assert_eq!(history.len(), 6);
        let progresses: Vec<f64> = history.iter().map(|e| e.progress).collect();
        for pair in progresses.windows(2) {
            assert!(
                pair[1] >= pair[0],
                "progress must be non-decreasing: {:?}",
                progresses
            );
        }
        assert!((progresses[5] - 1.0).abs() < 1e-9);
    }
}
