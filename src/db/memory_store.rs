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

//! Conversation memory and workflow-state persistence.
//!
//! Conversations live 7 days past last activity, workflow-state snapshots 6
//! hours. Saves are atomic replaces keyed by user id / workflow id; expired
//! rows are invisible to reads and purged opportunistically on writes.

use super::{DBClient, StoreError};
use crate::models::conversation::ConversationContext;
use crate::models::workflow::WorkflowContext;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Conversation row TTL
pub const CONVERSATION_TTL_DAYS: u32 = 7;

/// Workflow-state row TTL
pub const WORKFLOW_STATE_TTL_HOURS: u32 = 6;

/// Persistent dialogue-state capability.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Loads a user's conversation; `None` for first-time users and expired rows
    async fn load_conversation(
        &self,
        user_id: &str,
    ) -> Result<Option<ConversationContext>, StoreError>;

    /// Atomically replaces the user's conversation, refreshing the TTL
    async fn save_conversation(&self, context: &ConversationContext) -> Result<(), StoreError>;

    /// Deletes a user's conversation
    async fn clear_conversation(&self, user_id: &str) -> Result<(), StoreError>;

    /// Persists a workflow context snapshot for status queries and debugging
    async fn save_workflow_state(&self, context: &WorkflowContext) -> Result<(), StoreError>;

    /// Loads a workflow context snapshot by workflow id
    async fn load_workflow_state(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowContext>, StoreError>;
}

/// [`MemoryStore`] over the embedded database.
pub struct SurrealMemoryStore {
    db: Arc<DBClient>,
}

impl SurrealMemoryStore {
    /// Creates a store over a shared client.
    pub fn new(db: Arc<DBClient>) -> Self {
        Self { db }
    }

    /// Drops rows past their TTL. Best effort; failures are logged.
    async fn purge_expired(&self) {
        for table in ["conversation", "workflow_state"] {
            let query = format!("DELETE {} WHERE expires_at <= time::now()", table);
            if let Err(e) = self.db.execute(&query, Vec::new()).await {
                warn!(table = table, error = %e, "Expired-row purge failed");
            }
        }
    }
}

#[async_trait]
impl MemoryStore for SurrealMemoryStore {
    #[instrument(name = "load_conversation", skip(self))]
    async fn load_conversation(
        &self,
        user_id: &str,
    ) -> Result<Option<ConversationContext>, StoreError> {
        let rows = self
            .db
            .query_json_with_params(
                "SELECT context FROM conversation \
                 WHERE user_id = $user AND expires_at > time::now()",
                vec![("user".to_string(), serde_json::json!(user_id))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else {
            debug!("No stored conversation");
            return Ok(None);
        };

        let context: ConversationContext = serde_json::from_value(row["context"].clone())?;
        debug!(
            exchanges = context.exchanges.len(),
            "Conversation loaded"
        );
        Ok(Some(context))
    }

    #[instrument(name = "save_conversation", skip(self, context), fields(user_id = %context.user_id))]
    async fn save_conversation(&self, context: &ConversationContext) -> Result<(), StoreError> {
        let mut stored = context.clone();
        stored.updated_at = Utc::now();

        self.db
            .execute(
                &format!(
                    "UPSERT type::thing('conversation', $id) CONTENT {{ \
                         user_id: $user, context: $ctx, \
                         expires_at: time::now() + {}d, updated_at: time::now() }}",
                    CONVERSATION_TTL_DAYS
                ),
                vec![
                    ("id".to_string(), serde_json::json!(stored.user_id)),
                    ("user".to_string(), serde_json::json!(stored.user_id)),
                    ("ctx".to_string(), serde_json::to_value(&stored)?),
                ],
            )
            .await?;

        info!(
            exchanges = stored.exchanges.len(),
            "Conversation saved"
        );

        self.purge_expired().await;
        Ok(())
    }

    #[instrument(name = "clear_conversation", skip(self))]
    async fn clear_conversation(&self, user_id: &str) -> Result<(), StoreError> {
        self.db.delete_record("conversation", user_id).await?;
        info!("Conversation cleared");
        Ok(())
    }

    #[instrument(
        name = "save_workflow_state",
        skip(self, context),
        fields(workflow_id = %context.workflow_id, status = %context.status)
    )]
    async fn save_workflow_state(&self, context: &WorkflowContext) -> Result<(), StoreError> {
        self.db
            .execute(
                &format!(
                    "UPSERT type::thing('workflow_state', $id) CONTENT {{ \
                         workflow_id: $wf, user_id: $user, status: $status, context: $ctx, \
                         expires_at: time::now() + {}h, updated_at: time::now() }}",
                    WORKFLOW_STATE_TTL_HOURS
                ),
                vec![
                    ("id".to_string(), serde_json::json!(context.workflow_id)),
                    ("wf".to_string(), serde_json::json!(context.workflow_id)),
                    ("user".to_string(), serde_json::json!(context.user_id)),
                    (
                        "status".to_string(),
                        serde_json::json!(context.status.to_string()),
                    ),
                    ("ctx".to_string(), serde_json::to_value(context)?),
                ],
            )
            .await?;

        debug!("Workflow state saved");
        Ok(())
    }

    #[instrument(name = "load_workflow_state", skip(self))]
    async fn load_workflow_state(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowContext>, StoreError> {
        let rows = self
            .db
            .query_json_with_params(
                "SELECT context FROM workflow_state \
                 WHERE workflow_id = $wf AND expires_at > time::now()",
                vec![("wf".to_string(), serde_json::json!(workflow_id))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let context: WorkflowContext = serde_json::from_value(row["context"].clone())?;
        Ok(Some(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversation::ConversationExchange;
    use crate::models::workflow::{Intent, UserPreferences, WorkflowRequest, WorkflowStatus};
    use tempfile::tempdir;

    async fn store() -> SurrealMemoryStore {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test_db");
        std::mem::forget(temp_dir);
        let db = Arc::new(
            DBClient::new(db_path.to_str().unwrap())
                .await
                .expect("Failed to create test DB"),
        );
        db.initialize_schema(8).await.expect("schema");
        SurrealMemoryStore::new(db)
    }

    fn conversation(user_id: &str) -> ConversationContext {
        let mut ctx = ConversationContext::new(user_id.to_string(), UserPreferences::default());
        ctx.append_exchange(ConversationExchange::new(
            "tesla news?".to_string(),
            "Tesla reported earnings.".to_string(),
            Intent::NewNewsQuery,
        ));
        ctx
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let store = store().await;
        let loaded = store.load_conversation("nobody").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let store = store().await;
        let ctx = conversation("user_rt");

        store.save_conversation(&ctx).await.unwrap();
        let loaded = store.load_conversation("user_rt").await.unwrap().unwrap();

        assert_eq!(loaded.user_id, "user_rt");
        assert_eq!(loaded.exchanges.len(), 1);
        assert_eq!(loaded.last_query.as_deref(), Some("tesla news?"));
        // Round trip is identical modulo updated_at
        assert_eq!(loaded.exchanges, ctx.exchanges);
        assert_eq!(loaded.message_count, ctx.message_count);
    }

    #[tokio::test]
    async fn test_save_replaces_previous() {
        let store = store().await;
        let mut ctx = conversation("user_rep");
        store.save_conversation(&ctx).await.unwrap();

        ctx.append_exchange(ConversationExchange::new(
            "more?".to_string(),
            "Sure.".to_string(),
            Intent::FollowUpDiscussion,
        ));
        store.save_conversation(&ctx).await.unwrap();

        let loaded = store.load_conversation("user_rep").await.unwrap().unwrap();
        assert_eq!(loaded.exchanges.len(), 2);
        assert_eq!(loaded.total_exchanges, 2);
    }

    #[tokio::test]
    async fn test_clear_conversation() {
        let store = store().await;
        store.save_conversation(&conversation("user_clr")).await.unwrap();

        store.clear_conversation("user_clr").await.unwrap();
        assert!(store.load_conversation("user_clr").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_workflow_state_roundtrip() {
        let store = store().await;
        let request = WorkflowRequest {
            user_id: "user_wf".to_string(),
            query: "gas prices?".to_string(),
            workflow_id: Some("wf_state_1".to_string()),
            user_preferences: UserPreferences::default(),
        };
        let mut ctx = WorkflowContext::from_request(&request);
        ctx.seal(WorkflowStatus::Completed);

        store.save_workflow_state(&ctx).await.unwrap();
        let loaded = store
            .load_workflow_state("wf_state_1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(loaded.workflow_id, "wf_state_1");
        assert_eq!(loaded.status, WorkflowStatus::Completed);
        assert_eq!(loaded.original_query, "gas prices?");
    }

    #[tokio::test]
    async fn test_load_missing_workflow_state() {
        let store = store().await;
        assert!(store.load_workflow_state("missing").await.unwrap().is_none());
    }
}
