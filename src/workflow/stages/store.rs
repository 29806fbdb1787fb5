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

//! Vector-store write stage: both collections are written in parallel.
//!
//! The article write is fatal on failure; the video write degrades to
//! articles-only. Both writes require aligned item/embedding lengths,
//! checked here before the collaborator is called.

use super::embeddings::{embeddings_from_metadata, META_ARTICLE_EMBEDDINGS, META_VIDEO_EMBEDDINGS};
use super::StageGuard;
use crate::error::{codes, AgentError, AgentResult};
use crate::models::workflow::WorkflowContext;
use crate::util::{run_bounded, CallContext};
use crate::workflow::progress::{stage, ProgressEmitter};
use crate::workflow::PipelineDeps;
use std::time::Duration;
use tracing::{info, warn};

/// Budget for the write stage
const STORE_BUDGET: Duration = Duration::from_secs(30);

/// Runs the vector-store write stage.
pub async fn run(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    let guard =
        StageGuard::begin(emitter, stage::VECTOR_STORE_WRITE, "Indexing fresh corpus").await;

    let article_embeddings = embeddings_from_metadata(context, META_ARTICLE_EMBEDDINGS)
        .unwrap_or_default();
    if article_embeddings.len() != context.articles.len() || context.articles.is_empty() {
        let err = AgentError::internal(
            codes::ARTICLE_STORE,
            format!(
                "article/embedding misalignment: {} articles, {} embeddings",
                context.articles.len(),
                article_embeddings.len()
            ),
        )
        .in_stage(stage::VECTOR_STORE_WRITE);
        guard.fail(context, &err).await;
        return Err(err);
    }

    let video_embeddings = embeddings_from_metadata(context, META_VIDEO_EMBEDDINGS);
    let videos_writable = match &video_embeddings {
        Some(embeddings) => embeddings.len() == context.videos.len() && !context.videos.is_empty(),
        None => false,
    };

    let articles = &context.articles;
    let videos = &context.videos;

    let (article_result, video_result) = futures::join!(
        run_bounded(call, STORE_BUDGET, "article_store", async {
            deps.vectors
                .store_articles(articles, &article_embeddings)
                .await
                .map_err(AgentError::from)
        }),
        async {
            if !videos_writable {
                return Ok(false);
            }
            let embeddings = video_embeddings.as_deref().unwrap_or_default();
            run_bounded(call, STORE_BUDGET, "video_store", async {
                deps.vectors
                    .store_videos(videos, embeddings)
                    .await
                    .map_err(AgentError::from)
            })
            .await
            .map(|_| true)
        },
    );

    if let Err(e) = article_result {
        let err = if e.is_cancelled() {
            e
        } else {
            let mut tagged = e.in_stage(stage::VECTOR_STORE_WRITE);
            tagged.code = codes::ARTICLE_STORE.to_string();
            tagged
        };
        guard.fail(context, &err).await;
        return Err(err);
    }

    let videos_written = match video_result {
        Ok(written) => written,
        Err(e) if e.is_cancelled() => {
            guard.fail(context, &e).await;
            return Err(e);
        }
        Err(e) => {
            warn!(error = %e, "Video vector write failed, continuing");
            false
        }
    };

    info!(
        articles = context.articles.len(),
        videos_written = videos_written,
        "Fresh corpus indexed"
    );

    guard
        .complete(
            context,
            format!(
                "Indexed {} articles{}",
                context.articles.len(),
                if videos_written {
                    format!(" and {} videos", context.videos.len())
                } else {
                    String::new()
                }
            ),
        )
        .await;
    Ok(())
}
