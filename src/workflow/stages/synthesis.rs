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

//! Synthesizer and personality stylizer, the tail of the news branch.
//!
//! Synthesis failure is fatal; stylization failure falls back to the
//! unstyled summary.

use super::StageGuard;
use crate::error::{codes, AgentResult};
use crate::models::workflow::WorkflowContext;
use crate::util::CallContext;
use crate::workflow::progress::{stage, ProgressEmitter};
use crate::workflow::PipelineDeps;
use tracing::{info, warn};

/// Articles included in the synthesis prompt
pub const SUMMARY_ARTICLES: usize = 5;

/// Videos included in the synthesis prompt
pub const SUMMARY_VIDEOS: usize = 8;

/// Runs the synthesizer stage. Fatal on failure.
pub async fn summarize(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    let guard =
        StageGuard::begin(emitter, stage::SYNTHESIZER, "Composing multi-source summary").await;

    let articles = &context.articles[..context.articles.len().min(SUMMARY_ARTICLES)];
    let videos = &context.videos[..context.videos.len().min(SUMMARY_VIDEOS)];

    match deps
        .intelligence
        .summarize(&context.original_query, articles, videos, call)
        .await
    {
        Ok(summary) => {
            info!(summary_len = summary.len(), "Summary composed");
            context.summary = Some(summary.clone());
            context.conversation.last_summary = Some(summary);
            guard.complete(context, "Summary ready").await;
            Ok(())
        }
        Err(e) => {
            let err = if e.is_cancelled() {
                e
            } else {
                let mut tagged = e.in_stage(stage::SYNTHESIZER);
                tagged.code = codes::SYNTHESIS.to_string();
                tagged
            };
            guard.fail(context, &err).await;
            Err(err)
        }
    }
}

/// Runs the personality stylizer stage. Optional: failure keeps the
/// unstyled summary as the final response.
pub async fn stylize(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    let guard = StageGuard::begin(
        emitter,
        stage::PERSONALITY_STYLIZER,
        format!("Styling response as {}", context.preferences.personality),
    )
    .await;

    let summary = context.summary.clone().unwrap_or_default();

    match deps
        .intelligence
        .stylize(&context.original_query, &summary, &context.preferences, call)
        .await
    {
        Ok(styled) if !styled.is_empty() => {
            context.final_response = Some(styled);
            guard.complete(context, "Styled response ready").await;
            Ok(())
        }
        Ok(_) => {
            warn!("Stylizer returned empty text, using unstyled summary");
            context.final_response = Some(summary);
            guard.complete(context, "Using unstyled summary").await;
            Ok(())
        }
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            warn!(error = %e, "Stylization failed, using unstyled summary");
            context.final_response = Some(summary);
            guard.fail(context, &e).await;
            Ok(())
        }
    }
}
