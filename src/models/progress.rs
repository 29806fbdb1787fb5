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

//! Progress event types streamed to clients during workflow execution.
//!
//! Every stage emits exactly one `processing` event on entry and one
//! `completed` or `failed` event on exit; the workflow itself is wrapped in
//! `workflow_started` and `workflow_completed`/`workflow_error` envelopes.

use super::workflow::Intent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// Workflow accepted and started
    WorkflowStarted,
    /// A stage transitioned
    AgentUpdate,
    /// Workflow finished successfully
    WorkflowCompleted,
    /// Workflow aborted
    WorkflowError,
}

/// Stage status carried on an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Not yet started
    Pending,
    /// Stage entered
    Processing,
    /// Stage finished
    Completed,
    /// Stage errored
    Failed,
    /// Optional stage bypassed
    Skipped,
    /// Stage retrying after a transient error
    Retrying,
    /// Stage deadline elapsed
    Timeout,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Pending => write!(f, "pending"),
            AgentStatus::Processing => write!(f, "processing"),
            AgentStatus::Completed => write!(f, "completed"),
            AgentStatus::Failed => write!(f, "failed"),
            AgentStatus::Skipped => write!(f, "skipped"),
            AgentStatus::Retrying => write!(f, "retrying"),
            AgentStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// The progress-event envelope published to the per-user stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentUpdate {
    /// Event kind
    #[serde(rename = "type")]
    pub update_type: UpdateType,
    /// Associated workflow
    pub workflow_id: String,
    /// Associated request
    pub request_id: String,
    /// Stage name, or the event kind for envelope events
    pub agent_name: String,
    /// Stage status
    pub status: AgentStatus,
    /// Human-readable description
    pub message: String,
    /// Fraction of the branch completed, in [0, 1]
    pub progress: f64,
    /// Emission time
    pub timestamp: DateTime<Utc>,
    /// Whether the condition described is retryable
    pub retryable: bool,
    /// Pipeline branch the event belongs to, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<Intent>,
    /// Stage-specific payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,
    /// Error message for failed events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stage duration for completed/failed events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

impl AgentUpdate {
    /// Creates a `workflow_started` envelope event.
    pub fn workflow_started(workflow_id: &str, request_id: &str) -> Self {
        Self {
            update_type: UpdateType::WorkflowStarted,
            workflow_id: workflow_id.to_string(),
            request_id: request_id.to_string(),
            agent_name: "workflow".to_string(),
            status: AgentStatus::Processing,
            message: "Workflow started".to_string(),
            progress: 0.0,
            timestamp: Utc::now(),
            retryable: false,
            branch: None,
            data: None,
            error: None,
            processing_time_ms: None,
        }
    }

    /// Creates a stage-transition event.
    pub fn agent(
        workflow_id: &str,
        request_id: &str,
        agent_name: &str,
        status: AgentStatus,
        message: String,
        progress: f64,
        branch: Intent,
    ) -> Self {
        Self {
            update_type: UpdateType::AgentUpdate,
            workflow_id: workflow_id.to_string(),
            request_id: request_id.to_string(),
            agent_name: agent_name.to_string(),
            status,
            message,
            progress: progress.clamp(0.0, 1.0),
            timestamp: Utc::now(),
            retryable: false,
            branch: Some(branch),
            data: None,
            error: None,
            processing_time_ms: None,
        }
    }

    /// Creates a `workflow_completed` envelope carrying the final response.
    pub fn workflow_completed(
        workflow_id: &str,
        request_id: &str,
        final_response: String,
        total_time_ms: u64,
    ) -> Self {
        let mut data = HashMap::new();
        data.insert("final_response".to_string(), final_response);
        Self {
            update_type: UpdateType::WorkflowCompleted,
            workflow_id: workflow_id.to_string(),
            request_id: request_id.to_string(),
            agent_name: "workflow".to_string(),
            status: AgentStatus::Completed,
            message: "Workflow completed".to_string(),
            progress: 1.0,
            timestamp: Utc::now(),
            retryable: false,
            branch: None,
            data: Some(data),
            error: None,
            processing_time_ms: Some(total_time_ms),
        }
    }

    /// Creates a `workflow_error` envelope.
    pub fn workflow_error(
        workflow_id: &str,
        request_id: &str,
        error: String,
        retryable: bool,
    ) -> Self {
        Self {
            update_type: UpdateType::WorkflowError,
            workflow_id: workflow_id.to_string(),
            request_id: request_id.to_string(),
            agent_name: "workflow".to_string(),
            status: AgentStatus::Failed,
            message: format!("Workflow failed: {}", error),
            progress: 0.0,
            timestamp: Utc::now(),
            retryable,
            branch: None,
            data: None,
            error: Some(error),
            processing_time_ms: None,
        }
    }

    /// Attaches a stage-specific payload entry.
    pub fn with_data(mut self, key: &str, value: String) -> Self {
        self.data
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value);
        self
    }

    /// Attaches a stage duration.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.processing_time_ms = Some(duration_ms);
        self
    }
}
