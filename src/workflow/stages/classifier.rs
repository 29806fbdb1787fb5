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

//! Intent classifier stage.
//!
//! A chain of strategies tried in order: full JSON classification over the
//! recent history, then the simple two-way classification, then the
//! chitchat default with zero confidence. Cancellation is never swallowed
//! by the chain.

use super::StageGuard;
use crate::error::AgentResult;
use crate::llm::intelligence::IntentClassification;
use crate::models::workflow::{Intent, WorkflowContext};
use crate::util::CallContext;
use crate::workflow::progress::{stage, ProgressEmitter};
use crate::workflow::PipelineDeps;
use tracing::{info, warn};

/// Classifier window over the conversation history
const HISTORY_WINDOW: usize = 3;

/// Runs the classifier stage and returns the branch to execute.
pub async fn run(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) -> AgentResult<Intent> {
    let guard = StageGuard::begin(emitter, stage::CLASSIFIER, "Classifying intent").await;

    let history = context.conversation.recent_exchanges(HISTORY_WINDOW).to_vec();
    let classification = classify(context, deps, call, &history).await?;

    apply(context, &classification);
    emitter.set_branch(classification.intent);

    info!(
        intent = %classification.intent,
        confidence = classification.confidence,
        is_follow_up = context.is_follow_up,
        "Intent decided"
    );

    guard
        .complete(
            context,
            format!(
                "Intent: {} (confidence {:.2})",
                classification.intent, classification.confidence
            ),
        )
        .await;

    Ok(classification.intent)
}

/// The strategy chain. Only cancellation short-circuits it.
async fn classify(
    context: &WorkflowContext,
    deps: &PipelineDeps,
    call: &CallContext,
    history: &[crate::models::conversation::ConversationExchange],
) -> AgentResult<IntentClassification> {
    match deps
        .intelligence
        .classify_intent(&context.original_query, history, call)
        .await
    {
        Ok(classification) => return Ok(classification),
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => warn!(error = %e, "Full classification failed, trying simple"),
    }

    match deps
        .intelligence
        .classify_intent_simple(&context.original_query, call)
        .await
    {
        Ok((intent, confidence)) => {
            return Ok(IntentClassification {
                intent,
                confidence,
                reasoning: "Simple two-way classification".to_string(),
                enhanced_query: None,
                referenced_topic: None,
                referenced_exchange_id: None,
            })
        }
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => warn!(error = %e, "Simple classification failed, defaulting to chitchat"),
    }

    Ok(IntentClassification {
        intent: Intent::Chitchat,
        confidence: 0.0,
        reasoning: "Classifier unavailable, defaulting to chitchat".to_string(),
        enhanced_query: None,
        referenced_topic: None,
        referenced_exchange_id: None,
    })
}

/// Writes the classification into the workflow context, keeping the
/// follow-up invariant: a follow-up always carries a non-empty referenced
/// topic.
fn apply(context: &mut WorkflowContext, classification: &IntentClassification) {
    context.intent = Some(classification.intent);
    context.intent_confidence = classification.confidence;

    if context.enhanced_query.is_none() {
        context.enhanced_query = classification.enhanced_query.clone();
    }

    if classification.intent == Intent::FollowUpDiscussion {
        context.is_follow_up = true;
        context.referenced_exchange_id = classification.referenced_exchange_id.clone();
        context.referenced_topic = classification
            .referenced_topic
            .clone()
            .or_else(|| fallback_topic(context));
    }
}

/// Last known topic when the classifier did not name one.
fn fallback_topic(context: &WorkflowContext) -> Option<String> {
    context
        .conversation
        .current_topics
        .last()
        .cloned()
        .or_else(|| {
            context
                .conversation
                .exchanges
                .last()
                .and_then(|e| e.key_topics.first().cloned())
        })
        .or_else(|| context.conversation.last_query.clone())
}
