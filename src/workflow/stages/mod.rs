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

//! Pipeline stage implementations.
//!
//! Every stage follows the same shape: emit a `processing` event on entry,
//! do its work against the collaborators, record its outcome in the
//! workflow context, and emit `completed` or `failed` on exit. Optional
//! stages emit `failed` but swallow the error.

pub mod classifier;
pub mod embeddings;
pub mod memory;
pub mod query;
pub mod ranker;
pub mod responders;
pub mod retrieval;
pub mod scrape;
pub mod store;
pub mod synthesis;

use crate::error::AgentError;
use crate::models::progress::AgentStatus;
use crate::models::workflow::WorkflowContext;
use crate::workflow::progress::ProgressEmitter;
use std::time::Instant;

/// Tracks one stage execution: entry event, timing, exit event and the
/// per-stage record on the context.
pub(crate) struct StageGuard<'a> {
    emitter: &'a ProgressEmitter,
    name: &'static str,
    started: Instant,
}

impl<'a> StageGuard<'a> {
    /// Emits the `processing` event and starts the clock.
    pub async fn begin(
        emitter: &'a ProgressEmitter,
        name: &'static str,
        message: impl Into<String>,
    ) -> StageGuard<'a> {
        emitter.stage_processing(name, message).await;
        StageGuard {
            emitter,
            name,
            started: Instant::now(),
        }
    }

    /// Milliseconds since the stage entered.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Seals the stage as completed.
    pub async fn complete(self, context: &mut WorkflowContext, message: impl Into<String>) {
        let elapsed = self.elapsed_ms();
        context.record_stage(self.name, AgentStatus::Completed, elapsed);
        self.emitter.stage_completed(self.name, message, elapsed).await;
    }

    /// Seals the stage as failed. The caller decides whether the error is
    /// fatal or recovered.
    pub async fn fail(self, context: &mut WorkflowContext, error: &AgentError) {
        let elapsed = self.elapsed_ms();
        context.record_stage(self.name, AgentStatus::Failed, elapsed);
        self.emitter.stage_failed(self.name, error, elapsed).await;
    }
}
