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

//! Retrieval fan-out: the news and video arms run concurrently and join
//! before the embedding stage.
//!
//! Join policy: a news arm that ends with zero articles fails the
//! pipeline; an empty video arm only narrows the answer to articles. The
//! arms return their results and the join point merges them into the
//! workflow context and the metadata bag.

use super::StageGuard;
use crate::error::{codes, AgentError, AgentResult};
use crate::models::news::NewsArticle;
use crate::models::progress::AgentStatus;
use crate::models::video::Video;
use crate::models::workflow::WorkflowContext;
use crate::util::{run_bounded, CallContext};
use crate::workflow::progress::{stage, ProgressEmitter};
use crate::workflow::PipelineDeps;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Keyword news search page size
pub const NEWS_PAGE_SIZE: usize = 100;

/// Recent-news fallback window
pub const RECENT_HOURS: u32 = 48;

/// Recent-news fallback page size
pub const RECENT_MAX: usize = 15;

/// Video search page size
pub const VIDEO_MAX: usize = 10;

/// Videos enriched with transcripts
pub const TRANSCRIPT_MAX: usize = 8;

/// Budget per search call
const SEARCH_BUDGET: Duration = Duration::from_secs(20);

/// Budget per transcript download
const TRANSCRIPT_BUDGET: Duration = Duration::from_secs(15);

/// Runs the retrieval fan-out and joins the results into the context.
pub async fn run(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    let keywords = context.keywords.clone();
    let query = context.effective_query().to_string();

    let (news_result, video_result) = futures::join!(
        news_arm(deps, emitter, call, &keywords, &query),
        video_arm(deps, emitter, call, &keywords, &query),
    );

    // Join: videos first so their stage record lands even when news failed
    let (videos, video_calls, video_elapsed) = video_result;
    context.record_stage(stage::VIDEO_FETCH, AgentStatus::Completed, video_elapsed);

    let (articles, news_calls, news_elapsed) = match news_result {
        Ok(ok) => ok,
        Err(e) => {
            context.record_stage(stage::NEWS_FETCH, AgentStatus::Failed, 0);
            return Err(e);
        }
    };
    context.record_stage(stage::NEWS_FETCH, AgentStatus::Completed, news_elapsed);

    context.stats.api_calls += news_calls + video_calls;
    context.stats.articles_found = articles.len() as u32;
    context.stats.videos_found = videos.len() as u32;

    // Metadata bag writes happen only at the join
    context.metadata.insert(
        "fresh_articles".to_string(),
        serde_json::to_value(&articles).unwrap_or_default(),
    );
    context.metadata.insert(
        "fresh_videos".to_string(),
        serde_json::to_value(&videos).unwrap_or_default(),
    );

    info!(
        articles = articles.len(),
        videos = videos.len(),
        "Retrieval fan-out joined"
    );

    context.articles = articles;
    context.videos = videos;
    Ok(())
}

/// News arm: keyword search with a recent-news fallback. Ending with zero
/// articles is fatal regardless of whether a provider errored.
async fn news_arm(
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
    keywords: &[String],
    query: &str,
) -> AgentResult<(Vec<NewsArticle>, u32, u64)> {
    emitter
        .stage_processing(stage::NEWS_FETCH, "Searching news coverage")
        .await;
    let started = Instant::now();
    let mut api_calls = 0u32;

    let mut articles: Vec<NewsArticle> = Vec::new();
    let mut last_error: Option<AgentError> = None;

    if !keywords.is_empty() {
        api_calls += 1;
        match run_bounded(call, SEARCH_BUDGET, stage::NEWS_FETCH, async {
            deps.news
                .search_keywords(keywords, NEWS_PAGE_SIZE)
                .await
                .map_err(AgentError::from)
        })
        .await
        {
            Ok(found) => articles = found.into_iter().filter(NewsArticle::is_valid).collect(),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Keyword news search failed");
                last_error = Some(e);
            }
        }
    }

    if articles.is_empty() {
        api_calls += 1;
        match run_bounded(call, SEARCH_BUDGET, stage::NEWS_FETCH, async {
            deps.news
                .search_recent(query, RECENT_HOURS, RECENT_MAX)
                .await
                .map_err(AgentError::from)
        })
        .await
        {
            Ok(found) => articles = found.into_iter().filter(NewsArticle::is_valid).collect(),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Recent news fallback failed");
                last_error = Some(e);
            }
        }
    }

    let elapsed = started.elapsed().as_millis() as u64;

    if articles.is_empty() {
        let mut err = AgentError::external(
            codes::NEWS_SEARCH,
            "news search returned no usable articles",
        )
        .in_stage(stage::NEWS_FETCH);
        if let Some(cause) = last_error {
            err.message = format!("news search failed: {}", cause.message);
        }
        emitter.stage_failed(stage::NEWS_FETCH, &err, elapsed).await;
        return Err(err);
    }

    emitter
        .stage_completed(
            stage::NEWS_FETCH,
            format!("Found {} fresh articles", articles.len()),
            elapsed,
        )
        .await;
    Ok((articles, api_calls, elapsed))
}

/// Video arm: keyword search with a query fallback, then sequential
/// transcript enrichment for the head of the list. Never fatal.
async fn video_arm(
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
    keywords: &[String],
    query: &str,
) -> (Vec<Video>, u32, u64) {
    emitter
        .stage_processing(stage::VIDEO_FETCH, "Searching video coverage")
        .await;
    let started = Instant::now();
    let mut api_calls = 0u32;

    let mut videos: Vec<Video> = Vec::new();

    if !keywords.is_empty() {
        api_calls += 1;
        match run_bounded(call, SEARCH_BUDGET, stage::VIDEO_FETCH, async {
            deps.videos
                .search_keywords(keywords, VIDEO_MAX)
                .await
                .map_err(AgentError::from)
        })
        .await
        {
            Ok(found) => videos = found.into_iter().filter(Video::is_valid).collect(),
            Err(e) => warn!(error = %e, "Keyword video search failed"),
        }
    }

    if videos.is_empty() && !call.cancel.is_cancelled() {
        api_calls += 1;
        match run_bounded(call, SEARCH_BUDGET, stage::VIDEO_FETCH, async {
            deps.videos
                .search_query(query, VIDEO_MAX)
                .await
                .map_err(AgentError::from)
        })
        .await
        {
            Ok(found) => videos = found.into_iter().filter(Video::is_valid).collect(),
            Err(e) => warn!(error = %e, "Query video search failed"),
        }
    }

    // Transcript enrichment runs sequentially over the accepted head
    for video in videos.iter_mut().take(TRANSCRIPT_MAX) {
        if call.cancel.is_cancelled() {
            break;
        }
        api_calls += 1;
        enrich_transcript(deps, call, video).await;
    }

    let elapsed = started.elapsed().as_millis() as u64;
    let message = if videos.is_empty() {
        "No videos found, continuing with articles only".to_string()
    } else {
        format!("Found {} videos", videos.len())
    };
    emitter
        .stage_completed(stage::VIDEO_FETCH, message, elapsed)
        .await;

    (videos, api_calls, elapsed)
}

/// Fetches captions for one video, falling back to a short LLM summary of
/// the title and description.
async fn enrich_transcript(deps: &PipelineDeps, call: &CallContext, video: &mut Video) {
    match run_bounded(call, TRANSCRIPT_BUDGET, "transcript", async {
        deps.videos
            .get_transcript(&video.id)
            .await
            .map_err(AgentError::from)
    })
    .await
    {
        Ok(transcript) => {
            video.set_transcript(&transcript);
            return;
        }
        Err(e) if e.is_cancelled() => return,
        Err(e) => warn!(video_id = %video.id, error = %e, "Transcript fetch failed"),
    }

    match deps.intelligence.video_fallback_summary(video, call).await {
        Ok(summary) if !summary.is_empty() => video.transcript = Some(summary),
        Ok(_) => {}
        Err(e) => warn!(video_id = %video.id, error = %e, "Fallback video summary failed"),
    }
}
