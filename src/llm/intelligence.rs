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

//! Domain-level LLM capability.
//!
//! [`NewsIntelligence`] is what the pipeline stages call: typed operations
//! (classify, enhance, extract, rank, summarize, stylize, reply) instead of
//! raw completions. The production implementation wraps an
//! [`LlmProvider`] with the circuit breaker, per-call retry and the
//! request's cancellation/deadline bounds.

use super::circuit_breaker::CircuitBreaker;
use super::parse::parse_json_object;
use super::prompts::{self, Prompt};
use super::provider::{LlmError, LlmProvider};
use super::retry::{with_retry, RetryConfig};
use crate::error::{AgentError, AgentResult};
use crate::models::conversation::{ConversationContext, ConversationExchange};
use crate::models::news::NewsArticle;
use crate::models::video::Video;
use crate::models::workflow::{Intent, UserPreferences};
use crate::util::{run_bounded, CallContext};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Per-call budget for any single LLM operation
pub const LLM_CALL_BUDGET: Duration = Duration::from_secs(45);

/// Ranker selection threshold
pub const RANK_SCORE_THRESHOLD: f64 = 0.6;

/// Ranker result cap
pub const RANK_MAX_RESULTS: usize = 8;

/// Ranker fallback size when nothing reaches the threshold
const RANK_FALLBACK_TOP: usize = 3;

/// Candidate cap sent to the ranking prompt (articles)
pub const RANK_PROMPT_ARTICLES: usize = 20;

/// Candidate cap sent to the ranking prompt (videos)
pub const RANK_PROMPT_VIDEOS: usize = 10;

/// Classifier output, fully typed.
#[derive(Debug, Clone)]
pub struct IntentClassification {
    /// Classified intent
    pub intent: Intent,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// One-sentence rationale
    pub reasoning: String,
    /// Standalone rewrite of the query, when the model provided one
    pub enhanced_query: Option<String>,
    /// Topic of the referenced exchange, for follow-ups
    pub referenced_topic: Option<String>,
    /// Id of the referenced exchange, for follow-ups
    pub referenced_exchange_id: Option<String>,
}

/// Typed LLM operations the pipeline depends on.
///
/// Every method honours the request's cancellation token and deadline via
/// the passed [`CallContext`].
#[async_trait]
pub trait NewsIntelligence: Send + Sync {
    /// Full intent classification over the recent history
    async fn classify_intent(
        &self,
        query: &str,
        history: &[ConversationExchange],
        ctx: &CallContext,
    ) -> AgentResult<IntentClassification>;

    /// Fallback two-way classification (news vs chitchat)
    async fn classify_intent_simple(
        &self,
        query: &str,
        ctx: &CallContext,
    ) -> AgentResult<(Intent, f64)>;

    /// Rewrites the query into compact AND-joined keyword form
    async fn enhance_query(
        &self,
        query: &str,
        conversation: &ConversationContext,
        ctx: &CallContext,
    ) -> AgentResult<String>;

    /// Extracts a de-duplicated keyword list
    async fn extract_keywords(&self, query: &str, ctx: &CallContext) -> AgentResult<Vec<String>>;

    /// Scores and winnows article candidates; results carry `relevance_score`
    async fn rank_articles(
        &self,
        query: &str,
        candidates: &[NewsArticle],
        ctx: &CallContext,
    ) -> AgentResult<Vec<NewsArticle>>;

    /// Scores and winnows video candidates; results carry `relevancy_score`
    async fn rank_videos(
        &self,
        query: &str,
        candidates: &[Video],
        ctx: &CallContext,
    ) -> AgentResult<Vec<Video>>;

    /// Query-focused multi-source summary
    async fn summarize(
        &self,
        query: &str,
        articles: &[NewsArticle],
        videos: &[Video],
        ctx: &CallContext,
    ) -> AgentResult<String>;

    /// Personality rewrite of the summary
    async fn stylize(
        &self,
        query: &str,
        summary: &str,
        preferences: &UserPreferences,
        ctx: &CallContext,
    ) -> AgentResult<String>;

    /// Grounded reply for follow-up discussion
    async fn contextual_reply(
        &self,
        query: &str,
        exchanges: &[ConversationExchange],
        referenced_topic: Option<&str>,
        preferences: &UserPreferences,
        ctx: &CallContext,
    ) -> AgentResult<String>;

    /// Open-domain reply conditioned on conversational memory
    async fn chitchat_reply(
        &self,
        query: &str,
        conversation: &ConversationContext,
        ctx: &CallContext,
    ) -> AgentResult<String>;

    /// Short fallback summary for a video without captions
    async fn video_fallback_summary(&self, video: &Video, ctx: &CallContext)
        -> AgentResult<String>;
}

// ============================================================================
// Raw JSON shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    enhanced_query: Option<String>,
    #[serde(default)]
    referenced_topic: Option<String>,
    #[serde(default)]
    referenced_exchange_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKeywords {
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRanking {
    relevant: Vec<RankEntry>,
}

/// One scored id from the ranking response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RankEntry {
    /// Candidate id echoed back by the model
    pub id: String,
    /// Relevance score in [0, 1]
    pub score: f64,
}

/// Applies the selection policy: entries scoring at least the threshold, at
/// most [`RANK_MAX_RESULTS`]; when none qualify, the best
/// `RANK_FALLBACK_TOP` by score.
pub(crate) fn apply_rank_policy(mut entries: Vec<RankEntry>) -> Vec<RankEntry> {
    for entry in &mut entries {
        entry.score = entry.score.clamp(0.0, 1.0);
    }
    entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let qualified: Vec<RankEntry> = entries
        .iter()
        .filter(|e| e.score >= RANK_SCORE_THRESHOLD)
        .take(RANK_MAX_RESULTS)
        .cloned()
        .collect();

    if !qualified.is_empty() {
        qualified
    } else {
        entries.into_iter().take(RANK_FALLBACK_TOP).collect()
    }
}

// ============================================================================
// Production implementation
// ============================================================================

/// [`NewsIntelligence`] over an [`LlmProvider`], guarded by the circuit
/// breaker and stage-level retry.
pub struct LlmIntelligence {
    provider: Arc<dyn LlmProvider>,
    breaker: CircuitBreaker,
    retry: RetryConfig,
}

impl LlmIntelligence {
    /// Wraps a provider with the default retry and breaker configuration.
    pub fn new(provider: Arc<dyn LlmProvider>, breaker: CircuitBreaker) -> Self {
        Self {
            provider,
            breaker,
            retry: RetryConfig::default(),
        }
    }

    /// One bounded, retried, breaker-guarded completion call.
    async fn call(
        &self,
        prompt: Prompt,
        temperature: f32,
        max_tokens: usize,
        label: &str,
        ctx: &CallContext,
    ) -> AgentResult<String> {
        self.breaker.try_acquire().await.map_err(AgentError::from)?;

        let result = run_bounded(ctx, LLM_CALL_BUDGET, label, async {
            with_retry(
                || {
                    self.provider
                        .complete(&prompt.user, Some(&prompt.system), temperature, max_tokens)
                },
                &self.retry,
                LlmError::is_retryable,
                &ctx.cancel,
            )
            .await
            .map(|response| response.content)
            .map_err(AgentError::from)
        })
        .await;

        match &result {
            Ok(_) => self.breaker.record_success().await,
            Err(err) if !err.is_cancelled() => self.breaker.record_failure().await,
            Err(_) => {}
        }
        result
    }
}

#[async_trait]
impl NewsIntelligence for LlmIntelligence {
    #[instrument(name = "classify_intent", skip_all, fields(history_len = history.len()))]
    async fn classify_intent(
        &self,
        query: &str,
        history: &[ConversationExchange],
        ctx: &CallContext,
    ) -> AgentResult<IntentClassification> {
        let prompt = prompts::classify_intent(query, history);
        let raw = self.call(prompt, 0.1, 300, "classify_intent", ctx).await?;

        let parsed: RawClassification = parse_json_object(&raw).map_err(AgentError::from)?;
        let intent: Intent = parsed.intent.parse().map_err(|e: String| {
            AgentError::from(LlmError::InvalidResponse(e))
        })?;

        debug!(intent = %intent, confidence = parsed.confidence, "Intent classified");

        Ok(IntentClassification {
            intent,
            confidence: parsed.confidence.clamp(0.0, 1.0),
            reasoning: parsed.reasoning,
            enhanced_query: parsed.enhanced_query.filter(|q| !q.trim().is_empty()),
            referenced_topic: parsed.referenced_topic.filter(|t| !t.trim().is_empty()),
            referenced_exchange_id: parsed
                .referenced_exchange_id
                .filter(|i| !i.trim().is_empty()),
        })
    }

    async fn classify_intent_simple(
        &self,
        query: &str,
        ctx: &CallContext,
    ) -> AgentResult<(Intent, f64)> {
        let prompt = prompts::classify_intent_simple(query);
        let raw = self.call(prompt, 0.0, 10, "classify_intent_simple", ctx).await?;

        let answer = raw.trim().to_lowercase();
        if answer.starts_with("news") {
            Ok((Intent::NewNewsQuery, 0.7))
        } else if answer.starts_with("chitchat") {
            Ok((Intent::Chitchat, 0.7))
        } else {
            Err(AgentError::from(LlmError::InvalidResponse(format!(
                "Expected news/chitchat, got: {}",
                &answer[..answer.len().min(50)]
            ))))
        }
    }

    async fn enhance_query(
        &self,
        query: &str,
        conversation: &ConversationContext,
        ctx: &CallContext,
    ) -> AgentResult<String> {
        let prompt = prompts::enhance_query(query, conversation);
        let raw = self.call(prompt, 0.2, 50, "enhance_query", ctx).await?;

        let enhanced = raw.trim().trim_matches('"').to_string();
        if enhanced.is_empty() {
            return Err(AgentError::from(LlmError::InvalidResponse(
                "Empty enhanced query".to_string(),
            )));
        }
        Ok(enhanced)
    }

    async fn extract_keywords(&self, query: &str, ctx: &CallContext) -> AgentResult<Vec<String>> {
        let prompt = prompts::extract_keywords(query);
        let raw = self.call(prompt, 0.1, 120, "extract_keywords", ctx).await?;

        let parsed: RawKeywords = parse_json_object(&raw).map_err(AgentError::from)?;
        let mut keywords: Vec<String> = Vec::new();
        for keyword in parsed.keywords {
            let trimmed = keyword.trim().to_string();
            if trimmed.is_empty() {
                continue;
            }
            if !keywords.iter().any(|k| k.eq_ignore_ascii_case(&trimmed)) {
                keywords.push(trimmed);
            }
        }

        if keywords.is_empty() {
            return Err(AgentError::from(LlmError::InvalidResponse(
                "No keywords extracted".to_string(),
            )));
        }
        Ok(keywords)
    }

    #[instrument(name = "rank_articles", skip_all, fields(candidates = candidates.len()))]
    async fn rank_articles(
        &self,
        query: &str,
        candidates: &[NewsArticle],
        ctx: &CallContext,
    ) -> AgentResult<Vec<NewsArticle>> {
        let window = &candidates[..candidates.len().min(RANK_PROMPT_ARTICLES)];
        let prompt = prompts::rank_articles(query, window);
        let raw = self.call(prompt, 0.1, 400, "rank_articles", ctx).await?;

        let parsed: RawRanking = parse_json_object(&raw).map_err(AgentError::from)?;
        let selected = apply_rank_policy(parsed.relevant);

        let mut ranked = Vec::new();
        for entry in selected {
            match window.iter().find(|a| a.id == entry.id) {
                Some(article) => {
                    let mut article = article.clone();
                    article.relevance_score = Some(entry.score);
                    ranked.push(article);
                }
                None => warn!(id = %entry.id, "Ranker returned unknown article id"),
            }
        }
        Ok(ranked)
    }

    #[instrument(name = "rank_videos", skip_all, fields(candidates = candidates.len()))]
    async fn rank_videos(
        &self,
        query: &str,
        candidates: &[Video],
        ctx: &CallContext,
    ) -> AgentResult<Vec<Video>> {
        let window = &candidates[..candidates.len().min(RANK_PROMPT_VIDEOS)];
        let prompt = prompts::rank_videos(query, window);
        let raw = self.call(prompt, 0.1, 400, "rank_videos", ctx).await?;

        let parsed: RawRanking = parse_json_object(&raw).map_err(AgentError::from)?;
        let selected = apply_rank_policy(parsed.relevant);

        let mut ranked = Vec::new();
        for entry in selected {
            match window.iter().find(|v| v.id == entry.id) {
                Some(video) => {
                    let mut video = video.clone();
                    video.relevancy_score = Some(entry.score);
                    ranked.push(video);
                }
                None => warn!(id = %entry.id, "Ranker returned unknown video id"),
            }
        }
        Ok(ranked)
    }

    async fn summarize(
        &self,
        query: &str,
        articles: &[NewsArticle],
        videos: &[Video],
        ctx: &CallContext,
    ) -> AgentResult<String> {
        let prompt = prompts::summarize(query, articles, videos);
        let summary = self.call(prompt, 0.4, 900, "summarize", ctx).await?;
        if summary.trim().is_empty() {
            return Err(AgentError::from(LlmError::InvalidResponse(
                "Empty summary".to_string(),
            )));
        }
        Ok(summary.trim().to_string())
    }

    async fn stylize(
        &self,
        query: &str,
        summary: &str,
        preferences: &UserPreferences,
        ctx: &CallContext,
    ) -> AgentResult<String> {
        let prompt = prompts::stylize(query, summary, preferences);
        let styled = self.call(prompt, 0.7, 900, "stylize", ctx).await?;
        Ok(styled.trim().to_string())
    }

    async fn contextual_reply(
        &self,
        query: &str,
        exchanges: &[ConversationExchange],
        referenced_topic: Option<&str>,
        preferences: &UserPreferences,
        ctx: &CallContext,
    ) -> AgentResult<String> {
        let prompt = prompts::contextual_reply(query, exchanges, referenced_topic, preferences);
        let reply = self.call(prompt, 0.6, 600, "contextual_reply", ctx).await?;
        Ok(reply.trim().to_string())
    }

    async fn chitchat_reply(
        &self,
        query: &str,
        conversation: &ConversationContext,
        ctx: &CallContext,
    ) -> AgentResult<String> {
        let prompt = prompts::chitchat_reply(query, conversation);
        let reply = self.call(prompt, 0.8, 300, "chitchat_reply", ctx).await?;
        Ok(reply.trim().to_string())
    }

    async fn video_fallback_summary(
        &self,
        video: &Video,
        ctx: &CallContext,
    ) -> AgentResult<String> {
        let prompt = prompts::video_fallback_summary(video);
        let summary = self.call(prompt, 0.3, 120, "video_fallback_summary", ctx).await?;
        Ok(summary.trim().to_string())
    }
}
