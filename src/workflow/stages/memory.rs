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

//! Memory stage: load the user's conversation context.
//!
//! Non-fatal by design: a gateway read error yields an empty context so a
//! storage outage degrades answers instead of failing them.

use super::StageGuard;
use crate::models::conversation::ConversationContext;
use crate::models::workflow::WorkflowContext;
use crate::workflow::progress::{stage, ProgressEmitter};
use crate::workflow::PipelineDeps;
use tracing::{debug, warn};

/// Runs the memory stage.
pub async fn run(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
) {
    let guard = StageGuard::begin(emitter, stage::MEMORY, "Loading conversation memory").await;

    let mut conversation = match deps.memory.load_conversation(&context.user_id).await {
        Ok(Some(existing)) => {
            context.stats.cache_hits += 1;
            debug!(
                exchanges = existing.exchanges.len(),
                "Conversation context loaded"
            );
            existing
        }
        Ok(None) => {
            debug!("First turn for user, starting empty conversation");
            ConversationContext::new(context.user_id.clone(), context.preferences.clone())
        }
        Err(e) => {
            warn!(error = %e, "Conversation load failed, starting empty");
            ConversationContext::new(context.user_id.clone(), context.preferences.clone())
        }
    };

    conversation.touch(&context.preferences);
    let exchanges = conversation.exchanges.len();
    context.conversation = conversation;

    guard
        .complete(
            context,
            format!("Conversation ready ({} prior exchanges)", exchanges),
        )
        .await;
}
