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

//! Non-retrieval branches: the follow-up contextual responder and the
//! chitchat responder.

use super::StageGuard;
use crate::error::AgentResult;
use crate::models::workflow::WorkflowContext;
use crate::util::CallContext;
use crate::workflow::progress::{stage, ProgressEmitter};
use crate::workflow::PipelineDeps;
use tracing::info;

/// Exchanges shown to the follow-up responder
const FOLLOW_UP_WINDOW: usize = 3;

/// Runs the follow-up branch: a reply grounded in the referenced exchange.
/// No retrieval is performed.
pub async fn follow_up(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    let guard = StageGuard::begin(
        emitter,
        stage::CONTEXTUAL_RESPONDER,
        "Answering from conversation context",
    )
    .await;

    let exchanges = context
        .conversation
        .recent_exchanges(FOLLOW_UP_WINDOW)
        .to_vec();

    match deps
        .intelligence
        .contextual_reply(
            &context.original_query,
            &exchanges,
            context.referenced_topic.as_deref(),
            &context.preferences,
            call,
        )
        .await
    {
        Ok(reply) => {
            info!(reply_len = reply.len(), "Contextual reply ready");
            context.final_response = Some(reply);
            context.conversation.last_referenced_topic = context.referenced_topic.clone();
            guard.complete(context, "Follow-up answered").await;
            Ok(())
        }
        Err(e) => {
            let err = e.in_stage(stage::CONTEXTUAL_RESPONDER);
            guard.fail(context, &err).await;
            Err(err)
        }
    }
}

/// Runs the chitchat branch: an open-domain reply conditioned on the
/// conversation history.
pub async fn chitchat(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<()> {
    let guard =
        StageGuard::begin(emitter, stage::CHITCHAT_RESPONDER, "Making conversation").await;

    match deps
        .intelligence
        .chitchat_reply(&context.original_query, &context.conversation, call)
        .await
    {
        Ok(reply) => {
            info!(reply_len = reply.len(), "Chitchat reply ready");
            context.final_response = Some(reply);
            guard.complete(context, "Reply ready").await;
            Ok(())
        }
        Err(e) => {
            let err = e.in_stage(stage::CHITCHAT_RESPONDER);
            guard.fail(context, &err).await;
            Err(err)
        }
    }
}
