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

//! End-to-end workflow scenarios over in-process mock collaborators.

use async_trait::async_trait;
use newsmind::db::vector_store::Scored;
use newsmind::db::{MemoryStore, StoreError, VectorCollection, VectorFilter, VectorStore};
use newsmind::error::{AgentResult, ErrorKind};
use newsmind::llm::embedding::EmbeddingError;
use newsmind::llm::intelligence::IntentClassification;
use newsmind::llm::{Embedder, NewsIntelligence};
use newsmind::models::conversation::{ConversationContext, ConversationExchange};
use newsmind::models::news::NewsArticle;
use newsmind::models::progress::{AgentStatus, AgentUpdate, UpdateType};
use newsmind::models::video::Video;
use newsmind::models::workflow::{
    Intent, UserPreferences, WorkflowContext, WorkflowRequest, WorkflowStatus,
};
use newsmind::scrape::{ScrapeBatch, ScrapeError, ScrapedPage, Scraper};
use newsmind::search::{NewsSearch, SearchError, VideoSearch};
use newsmind::util::CallContext;
use newsmind::workflow::{PipelineDeps, ProgressBus, WorkflowOrchestrator, WorkflowRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fixtures
// ============================================================================

fn articles(count: usize) -> Vec<NewsArticle> {
    (0..count)
        .map(|i| {
            let mut article = NewsArticle::new(
                format!("Gas price headline {}", i),
                format!("https://news.example/gas-{}", i),
                "Example Wire".to_string(),
            );
            article.description = format!("Fuel costs moved again, story {}.", i);
            article
        })
        .collect()
}

fn videos(count: usize) -> Vec<Video> {
    (0..count)
        .map(|i| Video {
            id: format!("vid-{}", i),
            title: format!("Video briefing {}", i),
            description: "Fuel market update.".to_string(),
            transcript: None,
            channel_id: "chan-1".to_string(),
            channel_name: "Market Watch".to_string(),
            thumbnail_url: None,
            published_at: None,
            url: format!("https://videos.example/watch?v=vid-{}", i),
            tags: vec![],
            view_count: 100,
            like_count: 10,
            comment_count: 1,
            duration_secs: 300,
            relevancy_score: None,
        })
        .collect()
}

// ============================================================================
// Mock collaborators
// ============================================================================

struct MockIntelligence {
    intent: Intent,
    confidence: f64,
    referenced_topic: Option<String>,
}

impl MockIntelligence {
    fn news() -> Self {
        Self {
            intent: Intent::NewNewsQuery,
            confidence: 0.92,
            referenced_topic: None,
        }
    }

    fn follow_up(topic: &str) -> Self {
        Self {
            intent: Intent::FollowUpDiscussion,
            confidence: 0.88,
            referenced_topic: Some(topic.to_string()),
        }
    }

    fn chitchat() -> Self {
        Self {
            intent: Intent::Chitchat,
            confidence: 0.95,
            referenced_topic: None,
        }
    }
}

#[async_trait]
impl NewsIntelligence for MockIntelligence {
    async fn classify_intent(
        &self,
        _query: &str,
        _history: &[ConversationExchange],
        _ctx: &CallContext,
    ) -> AgentResult<IntentClassification> {
        Ok(IntentClassification {
            intent: self.intent,
            confidence: self.confidence,
            reasoning: "mock classification".to_string(),
            enhanced_query: None,
            referenced_topic: self.referenced_topic.clone(),
            referenced_exchange_id: None,
        })
    }

    async fn classify_intent_simple(
        &self,
        _query: &str,
        _ctx: &CallContext,
    ) -> AgentResult<(Intent, f64)> {
        Ok((self.intent, 0.7))
    }

    async fn enhance_query(
        &self,
        _query: &str,
        _conversation: &ConversationContext,
        _ctx: &CallContext,
    ) -> AgentResult<String> {
        Ok("gas prices US".to_string())
    }

    async fn extract_keywords(
        &self,
        _query: &str,
        _ctx: &CallContext,
    ) -> AgentResult<Vec<String>> {
        Ok(vec!["gas".to_string(), "prices".to_string()])
    }

    async fn rank_articles(
        &self,
        _query: &str,
        candidates: &[NewsArticle],
        _ctx: &CallContext,
    ) -> AgentResult<Vec<NewsArticle>> {
        Ok(candidates
            .iter()
            .take(8)
            .cloned()
            .map(|mut a| {
                a.relevance_score = Some(0.9);
                a
            })
            .collect())
    }

    async fn rank_videos(
        &self,
        _query: &str,
        candidates: &[Video],
        _ctx: &CallContext,
    ) -> AgentResult<Vec<Video>> {
        Ok(candidates
            .iter()
            .take(8)
            .cloned()
            .map(|mut v| {
                v.relevancy_score = Some(0.8);
                v
            })
            .collect())
    }

    async fn summarize(
        &self,
        query: &str,
        articles: &[NewsArticle],
        _videos: &[Video],
        _ctx: &CallContext,
    ) -> AgentResult<String> {
        let top = articles
            .first()
            .map(|a| a.title.clone())
            .unwrap_or_else(|| "no articles".to_string());
        Ok(format!("Answering '{}': the key story is \"{}\".", query, top))
    }

    async fn stylize(
        &self,
        _query: &str,
        summary: &str,
        preferences: &UserPreferences,
        _ctx: &CallContext,
    ) -> AgentResult<String> {
        Ok(format!("[{}] {}", preferences.personality, summary))
    }

    async fn contextual_reply(
        &self,
        _query: &str,
        exchanges: &[ConversationExchange],
        referenced_topic: Option<&str>,
        _preferences: &UserPreferences,
        _ctx: &CallContext,
    ) -> AgentResult<String> {
        let prior = exchanges
            .last()
            .map(|e| e.assistant_response.clone())
            .unwrap_or_default();
        Ok(format!(
            "More on {}: previously I said \"{}\"",
            referenced_topic.unwrap_or("that"),
            prior
        ))
    }

    async fn chitchat_reply(
        &self,
        _query: &str,
        conversation: &ConversationContext,
        _ctx: &CallContext,
    ) -> AgentResult<String> {
        let remembered: Vec<String> = conversation
            .exchanges
            .iter()
            .map(|e| e.user_query.clone())
            .collect();
        Ok(format!("From what you've told me ({}), here you go.", remembered.join("; ")))
    }

    async fn video_fallback_summary(
        &self,
        video: &Video,
        _ctx: &CallContext,
    ) -> AgentResult<String> {
        Ok(format!("Likely covers: {}", video.title))
    }
}

struct MockEmbedder {
    fail_texts_containing: Option<String>,
    delay: Option<Duration>,
}

impl MockEmbedder {
    fn ok() -> Self {
        Self {
            fail_texts_containing: None,
            delay: None,
        }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn dimension(&self) -> usize {
        4
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(marker) = &self.fail_texts_containing {
            if text.contains(marker.as_str()) {
                return Err(EmbeddingError::RequestFailed("mock failure".to_string()));
            }
        }
        Ok(vec![0.1, 0.2, 0.3, 0.4])
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        _cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

struct MockNews {
    articles: Vec<NewsArticle>,
}

#[async_trait]
impl NewsSearch for MockNews {
    async fn search_keywords(
        &self,
        _keywords: &[String],
        max: usize,
    ) -> Result<Vec<NewsArticle>, SearchError> {
        if self.articles.is_empty() {
            return Err(SearchError::RequestFailed(
                "provider returned nothing".to_string(),
            ));
        }
        Ok(self.articles.iter().take(max).cloned().collect())
    }

    async fn search_recent(
        &self,
        _query: &str,
        _hours_back: u32,
        max: usize,
    ) -> Result<Vec<NewsArticle>, SearchError> {
        if self.articles.is_empty() {
            return Err(SearchError::RequestFailed(
                "provider returned nothing".to_string(),
            ));
        }
        Ok(self.articles.iter().take(max).cloned().collect())
    }
}

struct MockVideos {
    videos: Vec<Video>,
}

#[async_trait]
impl VideoSearch for MockVideos {
    async fn search_keywords(
        &self,
        _keywords: &[String],
        max: usize,
    ) -> Result<Vec<Video>, SearchError> {
        Ok(self.videos.iter().take(max).cloned().collect())
    }

    async fn search_query(&self, _query: &str, max: usize) -> Result<Vec<Video>, SearchError> {
        Ok(self.videos.iter().take(max).cloned().collect())
    }

    async fn get_transcript(&self, video_id: &str) -> Result<String, SearchError> {
        Ok(format!("transcript for {}", video_id))
    }
}

struct MockScraper;

#[async_trait]
impl Scraper for MockScraper {
    async fn scrape(&self, url: &str, _budget: Duration) -> Result<ScrapedPage, ScrapeError> {
        Ok(ScrapedPage {
            url: url.to_string(),
            title: "scraped".to_string(),
            content: "Full scraped body text for the story.".to_string(),
            description: None,
            author: None,
            published_at: None,
            image_url: None,
            tags: vec![],
        })
    }

    async fn scrape_many(&self, urls: &[String]) -> ScrapeBatch {
        let mut batch = ScrapeBatch::default();
        for url in urls {
            batch.ok.push(self.scrape(url, Duration::from_secs(1)).await.unwrap());
        }
        batch
    }
}

#[derive(Default)]
struct MockMemory {
    conversations: Mutex<HashMap<String, ConversationContext>>,
    workflow_states: Mutex<HashMap<String, WorkflowContext>>,
}

#[async_trait]
impl MemoryStore for MockMemory {
    async fn load_conversation(
        &self,
        user_id: &str,
    ) -> Result<Option<ConversationContext>, StoreError> {
        Ok(self.conversations.lock().unwrap().get(user_id).cloned())
    }

    async fn save_conversation(&self, context: &ConversationContext) -> Result<(), StoreError> {
        self.conversations
            .lock()
            .unwrap()
            .insert(context.user_id.clone(), context.clone());
        Ok(())
    }

    async fn clear_conversation(&self, user_id: &str) -> Result<(), StoreError> {
        self.conversations.lock().unwrap().remove(user_id);
        Ok(())
    }

    async fn save_workflow_state(&self, context: &WorkflowContext) -> Result<(), StoreError> {
        self.workflow_states
            .lock()
            .unwrap()
            .insert(context.workflow_id.clone(), context.clone());
        Ok(())
    }

    async fn load_workflow_state(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowContext>, StoreError> {
        Ok(self.workflow_states.lock().unwrap().get(workflow_id).cloned())
    }
}

#[derive(Default)]
struct MockVectors {
    article_writes: Mutex<Vec<usize>>,
    video_writes: Mutex<Vec<usize>>,
}

#[async_trait]
impl VectorStore for MockVectors {
    async fn store_articles(
        &self,
        articles: &[NewsArticle],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        assert_eq!(
            articles.len(),
            embeddings.len(),
            "store precondition must hold at every call site"
        );
        assert!(!articles.is_empty());
        self.article_writes.lock().unwrap().push(articles.len());
        Ok(())
    }

    async fn store_videos(
        &self,
        videos: &[Video],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        assert_eq!(videos.len(), embeddings.len());
        assert!(!videos.is_empty());
        self.video_writes.lock().unwrap().push(videos.len());
        Ok(())
    }

    async fn similar_articles(
        &self,
        _query_embedding: &[f32],
        _top_k: usize,
        _filter: Option<&VectorFilter>,
    ) -> Result<Vec<Scored<NewsArticle>>, StoreError> {
        Ok(Vec::new())
    }

    async fn similar_videos(
        &self,
        _query_embedding: &[f32],
        _top_k: usize,
        _filter: Option<&VectorFilter>,
    ) -> Result<Vec<Scored<Video>>, StoreError> {
        Ok(Vec::new())
    }

    async fn delete(
        &self,
        _collection: VectorCollection,
        _ids: &[String],
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    orchestrator: Arc<WorkflowOrchestrator>,
    bus: Arc<ProgressBus>,
    memory: Arc<MockMemory>,
    vectors: Arc<MockVectors>,
}

fn harness(
    intelligence: MockIntelligence,
    embedder: MockEmbedder,
    news: MockNews,
    video_search: MockVideos,
) -> Harness {
    let memory = Arc::new(MockMemory::default());
    let vectors = Arc::new(MockVectors::default());

    let deps = Arc::new(PipelineDeps {
        intelligence: Arc::new(intelligence),
        embedder: Arc::new(embedder),
        news: Arc::new(news),
        videos: Arc::new(video_search),
        scraper: Arc::new(MockScraper),
        memory: memory.clone(),
        vectors: vectors.clone(),
    });

    let registry = Arc::new(WorkflowRegistry::new());
    let bus = Arc::new(ProgressBus::new());
    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        deps,
        registry,
        bus.clone(),
        Duration::from_secs(30),
        Duration::from_secs(5),
    ));

    Harness {
        orchestrator,
        bus,
        memory,
        vectors,
    }
}

fn request(user_id: &str, query: &str) -> WorkflowRequest {
    WorkflowRequest {
        user_id: user_id.to_string(),
        query: query.to_string(),
        workflow_id: None,
        user_preferences: UserPreferences::default(),
    }
}

fn seed_conversation(harness: &Harness, user_id: &str, query: &str, response: &str, topic: &str) {
    let mut conversation =
        ConversationContext::new(user_id.to_string(), UserPreferences::default());
    let mut exchange = ConversationExchange::new(
        query.to_string(),
        response.to_string(),
        Intent::NewNewsQuery,
    );
    if !topic.is_empty() {
        exchange.key_topics = vec![topic.to_string()];
    }
    conversation.append_exchange(exchange);
    harness
        .memory
        .conversations
        .lock()
        .unwrap()
        .insert(user_id.to_string(), conversation);
}

fn assert_event_envelope(events: &[AgentUpdate]) {
    let started: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.update_type == UpdateType::WorkflowStarted)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(started.len(), 1, "exactly one workflow_started");
    assert_eq!(started[0], 0, "workflow_started precedes all agent updates");

    let terminals: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            matches!(
                e.update_type,
                UpdateType::WorkflowCompleted | UpdateType::WorkflowError
            )
        })
        .map(|(i, _)| i)
        .collect();
    assert_eq!(terminals.len(), 1, "exactly one terminal envelope");
    assert_eq!(
        terminals[0],
        events.len() - 1,
        "terminal envelope ends the sequence"
    );
}

fn assert_monotonic_progress(events: &[AgentUpdate]) {
    let mut last = 0.0_f64;
    for event in events {
        if event.update_type == UpdateType::AgentUpdate
            && matches!(event.status, AgentStatus::Processing | AgentStatus::Completed)
        {
            assert!(
                event.progress >= last,
                "progress regressed at {}: {} < {}",
                event.agent_name,
                event.progress,
                last
            );
            last = event.progress;
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn news_query_happy_path() {
    let h = harness(
        MockIntelligence::news(),
        MockEmbedder::ok(),
        MockNews { articles: articles(30) },
        MockVideos { videos: videos(6) },
    );

    let response = h
        .orchestrator
        .execute(request("user_news", "Why are US gas prices rising?"))
        .await
        .expect("execute returns a response");

    assert_eq!(response.status, "completed");
    // Styled with the default personality and grounded in an article title
    assert!(response.message.contains("[friendly-explainer]"));
    assert!(response.message.contains("Gas price headline"));

    let events = h.bus.history("user_news").await;
    assert_event_envelope(&events);
    assert_monotonic_progress(&events);

    // All twelve news-branch stages emitted events
    for stage in [
        "memory",
        "intent_classifier",
        "query_enhancer",
        "keyword_extractor",
        "news_fetch",
        "video_fetch",
        "embedding_generator",
        "vector_store_write",
        "relevance_ranker",
        "scrape_enricher",
        "synthesizer",
        "personality_stylizer",
    ] {
        assert!(
            events.iter().any(|e| e.agent_name == stage),
            "missing events for stage {}",
            stage
        );
    }

    // Stats and persistence
    let stored = h
        .memory
        .load_workflow_state(&response.workflow_id)
        .await
        .unwrap()
        .expect("final context persisted");
    assert_eq!(stored.status, WorkflowStatus::Completed);
    assert!(stored.stats.articles_found >= 1);
    assert!(stored.stats.articles_filtered <= 8);
    assert!(stored.ended_at.unwrap() >= stored.started_at);
    for article in &stored.articles {
        let score = article.relevance_score.expect("ranked article has a score");
        assert!((0.0..=1.0).contains(&score));
    }

    // One new conversation exchange persisted
    let conversation = h
        .memory
        .load_conversation("user_news")
        .await
        .unwrap()
        .expect("conversation saved");
    assert_eq!(conversation.exchanges.len(), 1);
    assert_eq!(
        conversation.exchanges[0].user_query,
        "Why are US gas prices rising?"
    );

    // Vector write happened exactly once for each collection
    assert_eq!(h.vectors.article_writes.lock().unwrap().len(), 1);
    assert_eq!(h.vectors.video_writes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn follow_up_references_prior_exchange() {
    let h = harness(
        MockIntelligence::follow_up("Tesla Q3 earnings"),
        MockEmbedder::ok(),
        MockNews { articles: articles(3) },
        MockVideos { videos: vec![] },
    );
    seed_conversation(
        &h,
        "user_follow",
        "what happened with tesla?",
        "Tesla beat Q3 revenue estimates.",
        "Tesla Q3 earnings",
    );

    let response = h
        .orchestrator
        .execute(request("user_follow", "tell me more about this"))
        .await
        .unwrap();

    assert_eq!(response.status, "completed");
    assert!(response.message.contains("Tesla"));

    let stored = h
        .memory
        .load_workflow_state(&response.workflow_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.intent, Some(Intent::FollowUpDiscussion));
    assert!(stored.is_follow_up);
    assert_eq!(stored.referenced_topic.as_deref(), Some("Tesla Q3 earnings"));

    // No retrieval ran
    let events = h.bus.history("user_follow").await;
    assert!(events.iter().all(|e| e.agent_name != "news_fetch"));
    assert!(events.iter().all(|e| e.agent_name != "video_fetch"));
    assert_event_envelope(&events);
    assert_monotonic_progress(&events);

    // Exchange count grew by exactly one
    let conversation = h.memory.load_conversation("user_follow").await.unwrap().unwrap();
    assert_eq!(conversation.exchanges.len(), 2);
}

#[tokio::test]
async fn chitchat_recalls_user_facts() {
    let h = harness(
        MockIntelligence::chitchat(),
        MockEmbedder::ok(),
        MockNews { articles: articles(1) },
        MockVideos { videos: vec![] },
    );
    seed_conversation(&h, "user_probe", "My name is John.", "Nice to meet you, John!", "");

    let response = h
        .orchestrator
        .execute(request("user_probe", "What's my name?"))
        .await
        .unwrap();

    assert_eq!(response.status, "completed");
    assert!(response.message.contains("John"));

    let stored = h
        .memory
        .load_workflow_state(&response.workflow_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.intent, Some(Intent::Chitchat));
}

#[tokio::test]
async fn news_retrieval_degraded_fails_pipeline() {
    let h = harness(
        MockIntelligence::news(),
        MockEmbedder::ok(),
        MockNews { articles: vec![] }, // both search paths return nothing
        MockVideos { videos: videos(3) },
    );

    let response = h
        .orchestrator
        .execute(request("user_degraded", "anything about gas?"))
        .await
        .unwrap();

    assert_eq!(response.status, "failed");
    assert!(response.message.contains("news search"));

    let events = h.bus.history("user_degraded").await;
    assert_event_envelope(&events);
    let terminal = events.last().unwrap();
    assert_eq!(terminal.update_type, UpdateType::WorkflowError);

    let stored = h
        .memory
        .load_workflow_state(&response.workflow_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, WorkflowStatus::Failed);

    // Video results were discarded with the failed pipeline
    assert!(h.vectors.video_writes.lock().unwrap().is_empty());

    // No exchange committed on failure
    assert!(h.memory.load_conversation("user_degraded").await.unwrap().is_none());
}

#[tokio::test]
async fn video_embedding_failure_degrades_to_articles_only() {
    let h = harness(
        MockIntelligence::news(),
        MockEmbedder {
            fail_texts_containing: Some("Video briefing".to_string()),
            delay: None,
        },
        MockNews { articles: articles(10) },
        MockVideos { videos: videos(4) },
    );

    let response = h
        .orchestrator
        .execute(request("user_vid_fail", "gas prices?"))
        .await
        .unwrap();

    assert_eq!(response.status, "completed");

    let events = h.bus.history("user_vid_fail").await;
    assert_eq!(
        events.last().unwrap().update_type,
        UpdateType::WorkflowCompleted
    );

    let stored = h
        .memory
        .load_workflow_state(&response.workflow_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, WorkflowStatus::Completed);
    assert_eq!(stored.stats.videos_filtered, 0, "answer is article-only");
    assert!(stored.stats.articles_filtered >= 1);

    // Videos never reached the vector store
    assert!(h.vectors.video_writes.lock().unwrap().is_empty());
    assert_eq!(h.vectors.article_writes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn cancellation_mid_embedding_stops_the_workflow() {
    let h = harness(
        MockIntelligence::news(),
        MockEmbedder {
            fail_texts_containing: None,
            delay: Some(Duration::from_millis(400)),
        },
        MockNews { articles: articles(5) },
        MockVideos { videos: vec![] },
    );

    let workflow_id = uuid::Uuid::new_v4().to_string();
    let mut req = request("user_cancel", "gas prices?");
    req.workflow_id = Some(workflow_id.clone());

    let orchestrator = h.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.execute(req).await });

    // Let the pipeline reach the embedding fan-out, then cancel
    tokio::time::sleep(Duration::from_millis(150)).await;
    h.orchestrator.cancel(&workflow_id).await.expect("cancel live workflow");

    let response = task.await.unwrap().unwrap();
    assert_eq!(response.status, "cancelled");

    let events = h.bus.history("user_cancel").await;
    assert_event_envelope(&events);
    assert_eq!(events.last().unwrap().update_type, UpdateType::WorkflowError);

    // Status reflects the terminal state and no exchange was committed
    let snapshot = h.orchestrator.get_status(&workflow_id).await.unwrap();
    assert_eq!(snapshot.status, WorkflowStatus::Cancelled);
    assert!(h.memory.load_conversation("user_cancel").await.unwrap().is_none());

    // No further events after the terminal envelope
    tokio::time::sleep(Duration::from_millis(300)).await;
    let later = h.bus.history("user_cancel").await;
    assert_eq!(later.len(), events.len());
}

#[tokio::test]
async fn duplicate_workflow_id_yields_single_live_entry() {
    let h = harness(
        MockIntelligence::news(),
        MockEmbedder {
            fail_texts_containing: None,
            delay: Some(Duration::from_millis(300)),
        },
        MockNews { articles: articles(5) },
        MockVideos { videos: vec![] },
    );

    let workflow_id = uuid::Uuid::new_v4().to_string();
    let mut first = request("user_dup", "gas prices?");
    first.workflow_id = Some(workflow_id.clone());
    let mut second = first.clone();
    second.user_id = "user_dup".to_string();

    let orchestrator = h.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.execute(first).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let duplicate = h.orchestrator.execute(second).await.unwrap();
    assert_eq!(duplicate.workflow_id, workflow_id);
    assert_eq!(duplicate.message, "Workflow already in progress");
    assert_eq!(h.orchestrator.active_count().await, 1);

    let original = task.await.unwrap().unwrap();
    assert_eq!(original.status, "completed");
    assert_eq!(h.orchestrator.active_count().await, 0);
}

#[tokio::test]
async fn status_falls_back_to_persistent_store() {
    let h = harness(
        MockIntelligence::chitchat(),
        MockEmbedder::ok(),
        MockNews { articles: articles(1) },
        MockVideos { videos: vec![] },
    );

    let response = h
        .orchestrator
        .execute(request("user_status", "hello there"))
        .await
        .unwrap();

    // Workflow is no longer live, but the persisted snapshot answers
    assert_eq!(h.orchestrator.active_count().await, 0);
    let snapshot = h.orchestrator.get_status(&response.workflow_id).await.unwrap();
    assert_eq!(snapshot.status, WorkflowStatus::Completed);
    assert_eq!(snapshot.workflow_id, response.workflow_id);

    let missing = h.orchestrator.get_status("00000000-0000-0000-0000-000000000000").await;
    assert_eq!(missing.unwrap_err().kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn close_waits_for_drain() {
    let h = harness(
        MockIntelligence::chitchat(),
        MockEmbedder::ok(),
        MockNews { articles: articles(1) },
        MockVideos { videos: vec![] },
    );

    // Nothing live: close returns promptly
    let started = std::time::Instant::now();
    h.orchestrator.close().await;
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn validation_rejects_bad_requests() {
    let h = harness(
        MockIntelligence::chitchat(),
        MockEmbedder::ok(),
        MockNews { articles: vec![] },
        MockVideos { videos: vec![] },
    );

    let err = h
        .orchestrator
        .execute(request("", "hello"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = h
        .orchestrator
        .execute(request("user", ""))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let mut bad_id = request("user", "hello");
    bad_id.workflow_id = Some("not-a-uuid".to_string());
    let err = h.orchestrator.execute(bad_id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}
