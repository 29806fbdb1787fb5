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

//! Embedding fan-out: the query embedding and the per-article/per-video
//! batches are generated concurrently.
//!
//! Query and article failures are fatal; a video batch failure drops
//! videos from the vector write and semantic retrieval while keeping them
//! in the context.

use super::StageGuard;
use crate::error::{codes, AgentError, AgentResult};
use crate::models::workflow::WorkflowContext;
use crate::util::{run_bounded, CallContext};
use crate::workflow::progress::{stage, ProgressEmitter};
use crate::workflow::PipelineDeps;
use std::time::Duration;
use tracing::{info, warn};

/// Budget for the whole embedding stage
const EMBEDDING_BUDGET: Duration = Duration::from_secs(60);

/// Metadata key: article embedding vectors, aligned with `context.articles`
pub const META_ARTICLE_EMBEDDINGS: &str = "article_embeddings";

/// Metadata key: video embedding vectors, aligned with `context.videos`
pub const META_VIDEO_EMBEDDINGS: &str = "video_embeddings";

/// Runs the embedding fan-out stage.
pub async fn run(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    let guard =
        StageGuard::begin(emitter, stage::EMBEDDING_GENERATOR, "Generating embeddings").await;

    let query = context.effective_query().to_string();
    let article_texts: Vec<String> = context.articles.iter().map(|a| a.embedding_text()).collect();
    let video_texts: Vec<String> = context.videos.iter().map(|v| v.embedding_text()).collect();

    let (query_result, article_result, video_result) = futures::join!(
        run_bounded(call, EMBEDDING_BUDGET, "query_embedding", async {
            deps.embedder.embed(&query).await.map_err(AgentError::from)
        }),
        run_bounded(call, EMBEDDING_BUDGET, "article_embeddings", async {
            deps.embedder
                .embed_batch(&article_texts, &call.cancel)
                .await
                .map_err(AgentError::from)
        }),
        run_bounded(call, EMBEDDING_BUDGET, "video_embeddings", async {
            deps.embedder
                .embed_batch(&video_texts, &call.cancel)
                .await
                .map_err(AgentError::from)
        }),
    );

    let query_embedding = match query_result {
        Ok(v) => v,
        Err(e) => {
            let err = e.in_stage(stage::EMBEDDING_GENERATOR);
            guard.fail(context, &err).await;
            return Err(err);
        }
    };

    let article_embeddings = match article_result {
        Ok(v) => v,
        Err(e) => {
            let err = if e.is_cancelled() {
                e
            } else {
                let mut tagged = e.in_stage(stage::EMBEDDING_GENERATOR);
                tagged.code = codes::ARTICLE_EMBEDDINGS.to_string();
                tagged
            };
            guard.fail(context, &err).await;
            return Err(err);
        }
    };

    let video_embeddings = match video_result {
        Ok(v) => Some(v),
        Err(e) if e.is_cancelled() => {
            guard.fail(context, &e).await;
            return Err(e);
        }
        Err(e) => {
            warn!(error = %e, "Video embeddings failed, continuing articles-only");
            None
        }
    };

    let mut generated = 1 + article_embeddings.len();
    context.query_embedding = Some(query_embedding);
    context.metadata.insert(
        META_ARTICLE_EMBEDDINGS.to_string(),
        serde_json::to_value(&article_embeddings).unwrap_or_default(),
    );
    if let Some(videos) = &video_embeddings {
        generated += videos.len();
        context.metadata.insert(
            META_VIDEO_EMBEDDINGS.to_string(),
            serde_json::to_value(videos).unwrap_or_default(),
        );
    }
    context.stats.embeddings_generated += generated as u32;

    info!(
        embeddings = generated,
        videos_embedded = video_embeddings.is_some(),
        "Embedding fan-out joined"
    );

    guard
        .complete(context, format!("Generated {} embeddings", generated))
        .await;
    Ok(())
}

/// Reads an embedding set back out of the metadata bag.
pub fn embeddings_from_metadata(
    context: &WorkflowContext,
    key: &str,
) -> Option<Vec<Vec<f32>>> {
    context
        .metadata
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::{UserPreferences, WorkflowRequest};

    #[test]
    fn test_embeddings_metadata_roundtrip() {
        let mut ctx = WorkflowContext::from_request(&WorkflowRequest {
            user_id: "u".to_string(),
            query: "q".to_string(),
            workflow_id: None,
            user_preferences: UserPreferences::default(),
        });

        let vectors = vec![vec![0.1_f32, 0.2], vec![0.3, 0.4]];
        ctx.metadata.insert(
            META_ARTICLE_EMBEDDINGS.to_string(),
            serde_json::to_value(&vectors).unwrap(),
        );

        let back = embeddings_from_metadata(&ctx, META_ARTICLE_EMBEDDINGS).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].len(), 2);
        assert!(embeddings_from_metadata(&ctx, META_VIDEO_EMBEDDINGS).is_none());
    }
}
