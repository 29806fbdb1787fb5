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

//! Live-workflow registry.
//!
//! A process-wide map keyed by workflow id. The executor owns the
//! [`WorkflowContext`](crate::models::workflow::WorkflowContext); the
//! registry holds only a handle (cancellation token plus a status snapshot
//! refreshed at stage boundaries), so ownership stays acyclic.

use crate::models::workflow::{ProcessingStats, WorkflowContext, WorkflowStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Externally visible state of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    /// Workflow id
    pub workflow_id: String,
    /// Request id
    pub request_id: String,
    /// Owning user
    pub user_id: String,
    /// Lifecycle status
    pub status: WorkflowStatus,
    /// Submission time
    pub started_at: DateTime<Utc>,
    /// Seal time, when terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Elapsed milliseconds so far (or total, when sealed)
    pub total_time_ms: u64,
    /// Final answer, when completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_response: Option<String>,
    /// Error message, when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Aggregate counters
    pub stats: ProcessingStats,
}

impl WorkflowSnapshot {
    /// Builds a snapshot from the executor-owned context.
    pub fn of(context: &WorkflowContext) -> Self {
        Self {
            workflow_id: context.workflow_id.clone(),
            request_id: context.request_id.clone(),
            user_id: context.user_id.clone(),
            status: context.status,
            started_at: context.started_at,
            ended_at: context.ended_at,
            total_time_ms: context.total_time_ms(),
            final_response: context.final_response.clone(),
            error: None,
            stats: context.stats.clone(),
        }
    }
}

/// Handle to a live workflow: the cancellation token and a snapshot for
/// external status queries.
pub struct WorkflowHandle {
    /// Per-workflow cancellation token
    pub cancel: CancellationToken,
    snapshot: RwLock<WorkflowSnapshot>,
}

impl WorkflowHandle {
    /// Creates a handle with an initial snapshot.
    pub fn new(cancel: CancellationToken, snapshot: WorkflowSnapshot) -> Self {
        Self {
            cancel,
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Current snapshot copy.
    pub async fn snapshot(&self) -> WorkflowSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Replaces the snapshot; called by the executor at stage boundaries.
    pub async fn update(&self, snapshot: WorkflowSnapshot) {
        *self.snapshot.write().await = snapshot;
    }

    /// Marks the snapshot with a status without touching the rest.
    pub async fn set_status(&self, status: WorkflowStatus) {
        self.snapshot.write().await.status = status;
    }
}

/// Process-wide concurrent map of live workflows.
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<String, Arc<WorkflowHandle>>>,
}

impl WorkflowRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a handle for a starting workflow.
    ///
    /// When the id is already live, the existing handle is returned as the
    /// error so duplicate submissions can report the first run's state.
    pub async fn insert(
        &self,
        workflow_id: &str,
        handle: Arc<WorkflowHandle>,
    ) -> Result<(), Arc<WorkflowHandle>> {
        let mut workflows = self.workflows.write().await;
        if let Some(existing) = workflows.get(workflow_id) {
            debug!(workflow_id, "Workflow id already live");
            return Err(existing.clone());
        }
        workflows.insert(workflow_id.to_string(), handle);
        info!(workflow_id, "Workflow registered");
        Ok(())
    }

    /// Retrieves a live workflow handle.
    pub async fn get(&self, workflow_id: &str) -> Option<Arc<WorkflowHandle>> {
        self.workflows.read().await.get(workflow_id).cloned()
    }

    /// Removes a workflow on exit.
    pub async fn remove(&self, workflow_id: &str) {
        let mut workflows = self.workflows.write().await;
        if workflows.remove(workflow_id).is_some() {
            info!(workflow_id, "Workflow removed from registry");
        }
    }

    /// Number of live workflows.
    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    /// True when no workflows are live.
    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }

    /// Live workflow ids, for shutdown polling.
    pub async fn ids(&self) -> Vec<String> {
        self.workflows.read().await.keys().cloned().collect()
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::{UserPreferences, WorkflowRequest};

    fn handle(workflow_id: &str) -> Arc<WorkflowHandle> {
        let ctx = WorkflowContext::from_request(&WorkflowRequest {
            user_id: "user_1".to_string(),
            query: "q".to_string(),
            workflow_id: Some(workflow_id.to_string()),
            user_preferences: UserPreferences::default(),
        });
        Arc::new(WorkflowHandle::new(
            CancellationToken::new(),
            WorkflowSnapshot::of(&ctx),
        ))
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let registry = WorkflowRegistry::new();
        assert!(registry.is_empty().await);

        registry.insert("wf_1", handle("wf_1")).await.unwrap();
        assert_eq!(registry.len().await, 1);
        assert!(registry.get("wf_1").await.is_some());
        assert!(registry.get("wf_other").await.is_none());

        registry.remove("wf_1").await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_insert_returns_existing() {
        let registry = WorkflowRegistry::new();
        let first = handle("wf_dup");
        registry.insert("wf_dup", first.clone()).await.unwrap();

        let second = handle("wf_dup");
        let existing = registry
            .insert("wf_dup", second)
            .await
            .expect_err("duplicate insert must fail");

        // At most one live entry, and the returned handle is the first one
        assert_eq!(registry.len().await, 1);
        assert_eq!(
            existing.snapshot().await.workflow_id,
            first.snapshot().await.workflow_id
        );
    }

    #[tokio::test]
    async fn test_snapshot_update() {
        let registry = WorkflowRegistry::new();
        let h = handle("wf_snap");
        registry.insert("wf_snap", h.clone()).await.unwrap();

        assert_eq!(h.snapshot().await.status, WorkflowStatus::Pending);
        h.set_status(WorkflowStatus::Processing).await;
        assert_eq!(
            registry.get("wf_snap").await.unwrap().snapshot().await.status,
            WorkflowStatus::Processing
        );
    }

    #[tokio::test]
    async fn test_ids_for_shutdown_polling() {
        let registry = WorkflowRegistry::new();
        registry.insert("wf_a", handle("wf_a")).await.unwrap();
        registry.insert("wf_b", handle("wf_b")).await.unwrap();

        let mut ids = registry.ids().await;
        ids.sort();
        assert_eq!(ids, vec!["wf_a", "wf_b"]);
    }

    #[tokio::test]
    async fn test_cancel_token_shared_through_handle() {
        let registry = WorkflowRegistry::new();
        let h = handle("wf_c");
        registry.insert("wf_c", h.clone()).await.unwrap();

        registry.get("wf_c").await.unwrap().cancel.cancel();
        assert!(h.cancel.is_cancelled());
    }
}
