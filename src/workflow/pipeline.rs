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

//! The conversational pipeline: memory and classification, then one of the
//! three branches.
//!
//! Stages run in strict program order; cancellation is observed between
//! every pair of stages and inside every collaborator call.

use super::stages;
use super::progress::ProgressEmitter;
use super::PipelineDeps;
use crate::error::AgentResult;
use crate::models::workflow::{Intent, WorkflowContext};
use crate::util::CallContext;
use tracing::{info, instrument};

/// Runs the full pipeline for one workflow.
#[instrument(
    name = "pipeline",
    skip_all,
    fields(workflow_id = %context.workflow_id, user_id = %context.user_id)
)]
pub async fn run(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    stages::memory::run(context, deps, emitter).await;
    call.ensure_active(&context.workflow_id)?;

    let intent = stages::classifier::run(context, deps, emitter, call).await?;
    call.ensure_active(&context.workflow_id)?;

    match intent {
        Intent::NewNewsQuery => news_branch(context, deps, emitter, call).await,
        Intent::FollowUpDiscussion => {
            stages::responders::follow_up(context, deps, emitter, call).await
        }
        Intent::Chitchat => stages::responders::chitchat(context, deps, emitter, call).await,
    }
}

/// The retrieval-backed branch.
async fn news_branch(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    stages::query::enhance(context, deps, emitter, call).await?;
    call.ensure_active(&context.workflow_id)?;

    stages::query::extract_keywords(context, deps, emitter, call).await?;
    call.ensure_active(&context.workflow_id)?;

    stages::retrieval::run(context, deps, emitter, call).await?;
    call.ensure_active(&context.workflow_id)?;

    stages::embeddings::run(context, deps, emitter, call).await?;
    call.ensure_active(&context.workflow_id)?;

    stages::store::run(context, deps, emitter, call).await?;
    call.ensure_active(&context.workflow_id)?;

    stages::ranker::run(context, deps, emitter, call).await?;
    call.ensure_active(&context.workflow_id)?;

    stages::scrape::run(context, deps, emitter, call).await;
    call.ensure_active(&context.workflow_id)?;

    stages::synthesis::summarize(context, deps, emitter, call).await?;
    call.ensure_active(&context.workflow_id)?;

    stages::synthesis::stylize(context, deps, emitter, call).await?;

    if context.final_response.is_none() {
        context.final_response = context.summary.clone();
    }

    info!(
        articles = context.articles.len(),
        videos = context.videos.len(),
        "News branch finished"
    );
    Ok(())
}
