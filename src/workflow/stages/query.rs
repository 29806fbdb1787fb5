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

//! Query-processing sub-pipeline of the news branch: expansion, then
//! keyword extraction, in strict sequence.
//!
//! Expansion failure is recovered (the original query is used); keyword
//! extraction failure is fatal for the branch.

use super::StageGuard;
use crate::error::{codes, AgentResult};
use crate::models::workflow::WorkflowContext;
use crate::util::CallContext;
use crate::workflow::progress::{stage, ProgressEmitter};
use crate::workflow::PipelineDeps;
use tracing::{info, warn};

/// Runs the query enhancer stage.
pub async fn enhance(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    let guard = StageGuard::begin(emitter, stage::QUERY_ENHANCER, "Rewriting query for retrieval").await;

    if context.enhanced_query.is_some() {
        // The classifier already produced a standalone rewrite
        let message = format!(
            "Using classifier rewrite: {}",
            context.enhanced_query.as_deref().unwrap_or_default()
        );
        guard.complete(context, message).await;
        return Ok(());
    }

    match deps
        .intelligence
        .enhance_query(&context.original_query, &context.conversation, call)
        .await
    {
        Ok(enhanced) => {
            info!(enhanced = %enhanced, "Query enhanced");
            context.enhanced_query = Some(enhanced.clone());
            guard
                .complete(context, format!("Enhanced query: {}", enhanced))
                .await;
            Ok(())
        }
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            warn!(error = %e, "Query enhancement failed, keeping original query");
            guard.fail(context, &e).await;
            Ok(())
        }
    }
}

/// Runs the keyword extractor stage. Fatal on failure.
pub async fn extract_keywords(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    let guard =
        StageGuard::begin(emitter, stage::KEYWORD_EXTRACTOR, "Extracting search keywords").await;

    match deps
        .intelligence
        .extract_keywords(context.effective_query(), call)
        .await
    {
        Ok(keywords) => {
            context.add_keywords(keywords);
            let message = format!("Keywords: {}", context.keywords.join(", "));
            guard.complete(context, message).await;
            Ok(())
        }
        Err(e) => {
            let err = e.in_stage(stage::KEYWORD_EXTRACTOR);
            let err = if err.is_cancelled() {
                err
            } else {
                let mut tagged = err;
                tagged.code = codes::KEYWORDS.to_string();
                tagged
            };
            guard.fail(context, &err).await;
            Err(err)
        }
    }
}
