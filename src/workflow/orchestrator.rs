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

//! Workflow orchestrator: owns the lifecycle of every request.
//!
//! Creates the context, registers it, runs the pipeline under the request
//! deadline and cancellation token, commits the conversation exchange on
//! success, seals the context, and always deregisters on exit. A pipeline
//! failure still produces a response (with status `failed`), never an
//! error to the caller.

use super::pipeline;
use super::progress::{ProgressBus, ProgressEmitter};
use super::registry::{WorkflowHandle, WorkflowRegistry, WorkflowSnapshot};
use super::PipelineDeps;
use crate::error::{codes, AgentError, AgentResult, ErrorKind};
use crate::models::conversation::ConversationExchange;
use crate::models::progress::AgentUpdate;
use crate::models::workflow::{
    Intent, WorkflowContext, WorkflowRequest, WorkflowResponse, WorkflowStatus,
};
use crate::util::CallContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Registry polling interval during shutdown
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum accepted user id length
const MAX_USER_ID_LEN: usize = 128;

/// Maximum accepted query length
const MAX_QUERY_LEN: usize = 4096;

/// Coordinates workflow execution end to end.
pub struct WorkflowOrchestrator {
    deps: Arc<PipelineDeps>,
    registry: Arc<WorkflowRegistry>,
    bus: Arc<ProgressBus>,
    request_timeout: Duration,
    shutdown_grace: Duration,
}

impl WorkflowOrchestrator {
    /// Creates an orchestrator over the shared collaborators.
    pub fn new(
        deps: Arc<PipelineDeps>,
        registry: Arc<WorkflowRegistry>,
        bus: Arc<ProgressBus>,
        request_timeout: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            deps,
            registry,
            bus,
            request_timeout,
            shutdown_grace,
        }
    }

    fn validate(request: &WorkflowRequest) -> AgentResult<()> {
        let user_id = request.user_id.trim();
        if user_id.is_empty() || user_id.len() > MAX_USER_ID_LEN {
            return Err(AgentError::validation(
                "invalid_user_id",
                format!("user_id must be 1-{} characters", MAX_USER_ID_LEN),
            ));
        }
        let query = request.query.trim();
        if query.is_empty() || query.len() > MAX_QUERY_LEN {
            return Err(AgentError::validation(
                "invalid_query",
                format!("query must be 1-{} characters", MAX_QUERY_LEN),
            ));
        }
        if let Some(id) = &request.workflow_id {
            if Uuid::parse_str(id).is_err() {
                return Err(AgentError::validation(
                    "invalid_workflow_id",
                    "workflow_id must be a UUID",
                ));
            }
        }
        Ok(())
    }

    /// Executes one workflow to completion.
    #[instrument(name = "execute_workflow", skip_all, fields(user_id = %request.user_id))]
    pub async fn execute(&self, request: WorkflowRequest) -> AgentResult<WorkflowResponse> {
        Self::validate(&request)?;

        let mut context = WorkflowContext::from_request(&request);
        let call = CallContext::new(self.request_timeout);
        let handle = Arc::new(WorkflowHandle::new(
            call.cancel.clone(),
            WorkflowSnapshot::of(&context),
        ));

        if let Err(existing) = self.registry.insert(&context.workflow_id, handle.clone()).await {
            let snapshot = existing.snapshot().await;
            info!(
                workflow_id = %context.workflow_id,
                "Duplicate submission, reporting live workflow state"
            );
            return Ok(WorkflowResponse {
                workflow_id: snapshot.workflow_id,
                request_id: snapshot.request_id,
                status: snapshot.status.to_string(),
                message: "Workflow already in progress".to_string(),
                total_time_ms: snapshot.total_time_ms,
            });
        }

        info!(
            workflow_id = %context.workflow_id,
            request_id = %context.request_id,
            "Workflow accepted"
        );

        // Initial state persistence is best effort
        if let Err(e) = self.deps.memory.save_workflow_state(&context).await {
            warn!(error = %e, "Initial workflow-state save failed");
        }

        let emitter = ProgressEmitter::new(self.bus.clone(), &context);
        emitter
            .publish(AgentUpdate::workflow_started(
                &context.workflow_id,
                &context.request_id,
            ))
            .await;

        let result = if context.status == WorkflowStatus::Pending {
            context.status = WorkflowStatus::Processing;
            handle.set_status(WorkflowStatus::Processing).await;
            pipeline::run(&mut context, &self.deps, &emitter, &call).await
        } else {
            Err(AgentError::internal(
                codes::INVALID_STATE,
                format!("workflow in state {} cannot start", context.status),
            ))
        };

        let response = match result {
            Ok(()) => self.finish_success(&mut context, &emitter).await,
            Err(e) => self.finish_failure(&mut context, &emitter, e).await,
        };

        let mut snapshot = WorkflowSnapshot::of(&context);
        if context.status != WorkflowStatus::Completed {
            snapshot.error = Some(response.message.clone());
        }
        handle.update(snapshot).await;

        // Final state persistence, for status queries and debugging
        if let Err(e) = self.deps.memory.save_workflow_state(&context).await {
            warn!(error = %e, "Final workflow-state save failed");
        }

        self.registry.remove(&context.workflow_id).await;
        Ok(response)
    }

    async fn finish_success(
        &self,
        context: &mut WorkflowContext,
        emitter: &ProgressEmitter,
    ) -> WorkflowResponse {
        let final_response = context
            .final_response
            .clone()
            .unwrap_or_else(|| "I wasn't able to put together an answer this time.".to_string());

        self.commit_exchange(context, &final_response).await;
        context.seal(WorkflowStatus::Completed);

        emitter
            .publish(AgentUpdate::workflow_completed(
                &context.workflow_id,
                &context.request_id,
                final_response.clone(),
                context.total_time_ms(),
            ))
            .await;

        info!(
            workflow_id = %context.workflow_id,
            total_time_ms = context.total_time_ms(),
            articles = context.stats.articles_filtered,
            videos = context.stats.videos_filtered,
            "Workflow completed"
        );

        WorkflowResponse {
            workflow_id: context.workflow_id.clone(),
            request_id: context.request_id.clone(),
            status: context.status.to_string(),
            message: final_response,
            total_time_ms: context.total_time_ms(),
        }
    }

    async fn finish_failure(
        &self,
        context: &mut WorkflowContext,
        emitter: &ProgressEmitter,
        err: AgentError,
    ) -> WorkflowResponse {
        let status = if err.is_cancelled() {
            WorkflowStatus::Cancelled
        } else if err.kind == ErrorKind::Timeout && err.code == codes::DEADLINE {
            WorkflowStatus::Timeout
        } else {
            WorkflowStatus::Failed
        };
        context.seal(status);

        error!(
            workflow_id = %context.workflow_id,
            error = %err,
            status = %status,
            "Workflow failed"
        );

        emitter
            .publish(AgentUpdate::workflow_error(
                &context.workflow_id,
                &context.request_id,
                err.to_string(),
                err.retryable,
            ))
            .await;

        WorkflowResponse {
            workflow_id: context.workflow_id.clone(),
            request_id: context.request_id.clone(),
            status: context.status.to_string(),
            message: err.to_string(),
            total_time_ms: context.total_time_ms(),
        }
    }

    /// Appends the exchange to the conversation and writes it back.
    async fn commit_exchange(&self, context: &mut WorkflowContext, final_response: &str) {
        let intent = context.intent.unwrap_or(Intent::Chitchat);
        let mut exchange = ConversationExchange::new(
            context.original_query.clone(),
            final_response.to_string(),
            intent,
        );
        exchange.keywords = context.keywords.clone();
        exchange.processing_time_ms = context.total_time_ms();
        exchange.key_topics = match intent {
            Intent::NewNewsQuery => context.enhanced_query.clone().into_iter().collect(),
            Intent::FollowUpDiscussion => context.referenced_topic.clone().into_iter().collect(),
            Intent::Chitchat => Vec::new(),
        };

        context.conversation.append_exchange(exchange);

        // Write-back is the serialization point for conversation state;
        // a failed write degrades memory, not the answer
        if let Err(e) = self.deps.memory.save_conversation(&context.conversation).await {
            warn!(error = %e, "Conversation write-back failed");
        }
    }

    /// Cancels a live workflow.
    pub async fn cancel(&self, workflow_id: &str) -> AgentResult<()> {
        let Some(handle) = self.registry.get(workflow_id).await else {
            return Err(AgentError::not_found(
                "workflow_not_found",
                format!("No live workflow with id {}", workflow_id),
            ));
        };

        info!(workflow_id, "Cancellation requested");
        handle.set_status(WorkflowStatus::Cancelled).await;
        handle.cancel.cancel();
        Ok(())
    }

    /// Status snapshot: live registry first, then the persistent store.
    pub async fn get_status(&self, workflow_id: &str) -> AgentResult<WorkflowSnapshot> {
        if let Some(handle) = self.registry.get(workflow_id).await {
            return Ok(handle.snapshot().await);
        }

        match self.deps.memory.load_workflow_state(workflow_id).await {
            Ok(Some(context)) => Ok(WorkflowSnapshot::of(&context)),
            Ok(None) => Err(AgentError::not_found(
                "workflow_not_found",
                format!("No workflow with id {}", workflow_id),
            )),
            Err(e) => Err(AgentError::from(e)),
        }
    }

    /// Number of live workflows.
    pub async fn active_count(&self) -> usize {
        self.registry.len().await
    }

    /// Waits for live workflows to drain, up to the grace period.
    #[instrument(name = "orchestrator_close", skip(self))]
    pub async fn close(&self) {
        let deadline = Instant::now() + self.shutdown_grace;

        while !self.registry.is_empty().await {
            if Instant::now() >= deadline {
                warn!(
                    remaining = self.registry.len().await,
                    "Shutdown grace elapsed with workflows still live"
                );
                return;
            }
            sleep(DRAIN_POLL_INTERVAL).await;
        }

        info!("All workflows drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::UserPreferences;

    fn request(user_id: &str, query: &str, workflow_id: Option<&str>) -> WorkflowRequest {
        WorkflowRequest {
            user_id: user_id.to_string(),
            query: query.to_string(),
            workflow_id: workflow_id.map(str::to_string),
            user_preferences: UserPreferences::default(),
        }
    }

    #[test]
    fn test_validation_accepts_normal_request() {
        assert!(WorkflowOrchestrator::validate(&request(
            "user_1",
            "What happened today?",
            None
        ))
        .is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_fields() {
        assert!(WorkflowOrchestrator::validate(&request("", "q", None)).is_err());
        assert!(WorkflowOrchestrator::validate(&request("u", "   ", None)).is_err());
    }

    #[test]
    fn test_validation_rejects_oversize() {
        let long_query = "x".repeat(MAX_QUERY_LEN + 1);
        assert!(WorkflowOrchestrator::validate(&request("u", &long_query, None)).is_err());

        let long_user = "u".repeat(MAX_USER_ID_LEN + 1);
        assert!(WorkflowOrchestrator::validate(&request(&long_user, "q", None)).is_err());
    }

    #[test]
    fn test_validation_rejects_malformed_workflow_id() {
        assert!(
            WorkflowOrchestrator::validate(&request("u", "q", Some("not-a-uuid"))).is_err()
        );
        let uuid = Uuid::new_v4().to_string();
        assert!(WorkflowOrchestrator::validate(&request("u", "q", Some(&uuid))).is_ok());
    }
}
