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

//! Relevance ranker: semantic retrieval feeds an LLM-scored winnowing of
//! the fresh candidates, with a fallback cascade when the model is
//! unavailable.
//!
//! Articles: LLM failure falls back to the semantic neighbours, then to
//! the top fresh articles with an assigned score. Videos: LLM failure
//! falls back to the semantic set, then to dropping videos entirely.

use super::embeddings::{embeddings_from_metadata, META_VIDEO_EMBEDDINGS};
use super::StageGuard;
use crate::error::AgentResult;
use crate::models::news::NewsArticle;
use crate::models::video::Video;
use crate::models::workflow::WorkflowContext;
use crate::util::{run_bounded, CallContext};
use crate::workflow::progress::{stage, ProgressEmitter};
use crate::workflow::PipelineDeps;
use std::time::Duration;
use tracing::{info, warn};

/// Semantic candidate pool size for articles
pub const SEMANTIC_ARTICLES: usize = 20;

/// Semantic candidate pool size for videos
pub const SEMANTIC_VIDEOS: usize = 10;

/// Fresh articles kept when every other path failed
pub const FRESH_FALLBACK: usize = 5;

/// Score assigned to fallback articles
pub const FRESH_FALLBACK_SCORE: f64 = 0.5;

/// Budget for the semantic queries
const SEMANTIC_BUDGET: Duration = Duration::from_secs(15);

/// Runs the relevance ranker stage.
pub async fn run(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    let guard =
        StageGuard::begin(emitter, stage::RELEVANCE_RANKER, "Ranking candidates by relevance").await;

    let query = context.effective_query().to_string();
    let query_embedding = context.query_embedding.clone().unwrap_or_default();
    let videos_embedded = embeddings_from_metadata(context, META_VIDEO_EMBEDDINGS).is_some();

    // Semantic neighbours: candidate set and fallback, fetched in parallel
    let (semantic_articles, semantic_videos) = futures::join!(
        semantic_articles(deps, call, &query_embedding),
        semantic_videos(deps, call, &query_embedding, videos_embedded),
    );

    let article_candidates = merge_articles(&context.articles, &semantic_articles);
    let ranked_articles = rank_articles(
        deps,
        call,
        &query,
        &article_candidates,
        &semantic_articles,
        &context.articles,
    )
    .await?;

    let ranked_videos = if videos_embedded && !context.videos.is_empty() {
        let video_candidates = merge_videos(&context.videos, &semantic_videos);
        rank_videos(deps, call, &query, &video_candidates, &semantic_videos).await?
    } else {
        Vec::new()
    };

    context.stats.articles_filtered = ranked_articles.len() as u32;
    context.stats.videos_filtered = ranked_videos.len() as u32;

    info!(
        articles = ranked_articles.len(),
        videos = ranked_videos.len(),
        "Relevance ranking settled"
    );

    let message = format!(
        "Kept {} articles and {} videos",
        ranked_articles.len(),
        ranked_videos.len()
    );
    context.articles = ranked_articles;
    context.videos = ranked_videos;
    guard.complete(context, message).await;
    Ok(())
}

async fn semantic_articles(
    deps: &PipelineDeps,
    call: &CallContext,
    query_embedding: &[f32],
) -> Vec<NewsArticle> {
    if query_embedding.is_empty() {
        return Vec::new();
    }
    match run_bounded(call, SEMANTIC_BUDGET, "semantic_articles", async {
        deps.vectors
            .similar_articles(query_embedding, SEMANTIC_ARTICLES, None)
            .await
            .map_err(crate::error::AgentError::from)
    })
    .await
    {
        Ok(hits) => hits
            .into_iter()
            .map(|hit| {
                let mut article = hit.item;
                article.relevance_score = Some(hit.similarity.clamp(0.0, 1.0));
                article
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "Semantic article retrieval failed");
            Vec::new()
        }
    }
}

async fn semantic_videos(
    deps: &PipelineDeps,
    call: &CallContext,
    query_embedding: &[f32],
    videos_embedded: bool,
) -> Vec<Video> {
    if query_embedding.is_empty() || !videos_embedded {
        return Vec::new();
    }
    match run_bounded(call, SEMANTIC_BUDGET, "semantic_videos", async {
        deps.vectors
            .similar_videos(query_embedding, SEMANTIC_VIDEOS, None)
            .await
            .map_err(crate::error::AgentError::from)
    })
    .await
    {
        Ok(hits) => hits
            .into_iter()
            .map(|hit| {
                let mut video = hit.item;
                video.relevancy_score = Some(hit.similarity.clamp(0.0, 1.0));
                video
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "Semantic video retrieval failed");
            Vec::new()
        }
    }
}

fn merge_articles(fresh: &[NewsArticle], semantic: &[NewsArticle]) -> Vec<NewsArticle> {
    let mut merged: Vec<NewsArticle> = fresh.to_vec();
    for candidate in semantic {
        if !merged.iter().any(|a| a.id == candidate.id) {
            merged.push(candidate.clone());
        }
    }
    merged
}

fn merge_videos(fresh: &[Video], semantic: &[Video]) -> Vec<Video> {
    let mut merged: Vec<Video> = fresh.to_vec();
    for candidate in semantic {
        if !merged.iter().any(|v| v.id == candidate.id) {
            merged.push(candidate.clone());
        }
    }
    merged
}

/// Article cascade: LLM scoring, then semantic neighbours, then the top
/// fresh articles with an assigned score.
async fn rank_articles(
    deps: &PipelineDeps,
    call: &CallContext,
    query: &str,
    candidates: &[NewsArticle],
    semantic: &[NewsArticle],
    fresh: &[NewsArticle],
) -> AgentResult<Vec<NewsArticle>> {
    match deps.intelligence.rank_articles(query, candidates, call).await {
        Ok(ranked) if !ranked.is_empty() => return Ok(ranked),
        Ok(_) => warn!("Article ranking selected nothing, using fallback"),
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => warn!(error = %e, "Article ranking failed, using fallback"),
    }

    if !semantic.is_empty() {
        return Ok(semantic.to_vec());
    }

    Ok(fresh
        .iter()
        .take(FRESH_FALLBACK)
        .cloned()
        .map(|mut article| {
            article.relevance_score = Some(FRESH_FALLBACK_SCORE);
            article
        })
        .collect())
}

/// Video cascade: LLM scoring, then semantic neighbours, then nothing.
async fn rank_videos(
    deps: &PipelineDeps,
    call: &CallContext,
    query: &str,
    candidates: &[Video],
    semantic: &[Video],
) -> AgentResult<Vec<Video>> {
    match deps.intelligence.rank_videos(query, candidates, call).await {
        Ok(ranked) if !ranked.is_empty() => return Ok(ranked),
        Ok(_) => warn!("Video ranking selected nothing, keeping semantic set"),
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => warn!(error = %e, "Video ranking failed, keeping semantic set"),
    }

    if !semantic.is_empty() {
        return Ok(semantic.to_vec());
    }

    warn!("No video ranking path succeeded, dropping videos");
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str) -> NewsArticle {
        NewsArticle::new(
            format!("Story {}", url),
            url.to_string(),
            "Wire".to_string(),
        )
    }

    #[test]
    fn test_merge_articles_dedupes_by_id() {
        let fresh = vec![article("https://e.com/a"), article("https://e.com/b")];
        let semantic = vec![article("https://e.com/b"), article("https://e.com/c")];

        let merged = merge_articles(&fresh, &semantic);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].url, "https://e.com/a");
        assert_eq!(merged[2].url, "https://e.com/c");
    }

    #[test]
    fn test_merge_articles_keeps_fresh_first() {
        let fresh = vec![article("https://e.com/a")];
        let merged = merge_articles(&fresh, &[]);
        assert_eq!(merged.len(), 1);
    }
}
