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

//! Thin HTTP adapter over the orchestrator.
//!
//! Handlers validate, delegate and serialize; all semantics live in the
//! workflow engine. Progress streams are exposed over SSE.

use crate::error::{AgentError, ErrorKind};
use crate::models::workflow::{WorkflowRequest, WorkflowResponse};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{delete, get, post},
    Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Health probe budget
const HEALTH_PROBE_BUDGET: Duration = Duration::from_secs(5);

/// Builds the full router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/workflows/execute", post(execute_workflow))
        .route("/api/v1/workflows/:id/status", get(workflow_status))
        .route("/api/v1/workflows/:id", delete(cancel_workflow))
        .route("/api/v1/workflows/active", get(active_workflows))
        .route("/api/v1/users/:user_id/updates", get(progress_stream))
        .route("/api/v1/users/:user_id/conversation", delete(clear_conversation))
        .route("/healthz", get(health))
        .layer(cors)
        .with_state(state)
}

/// Error body returned on every non-2xx response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    code: String,
    message: String,
    retryable: bool,
}

/// Wrapper mapping [`AgentError`] onto HTTP responses.
struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::External | ErrorKind::Unavailable | ErrorKind::CircuitBreaker => {
                StatusCode::BAD_GATEWAY
            }
            ErrorKind::Internal | ErrorKind::Agent => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            kind: self.0.kind.to_string(),
            code: self.0.code.clone(),
            message: self.0.message.clone(),
            retryable: self.0.retryable,
        };
        (status, Json(body)).into_response()
    }
}

async fn execute_workflow(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WorkflowRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let response = state.orchestrator.execute(request).await?;
    Ok(Json(response))
}

async fn workflow_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.orchestrator.get_status(&id).await?;
    Ok(Json(snapshot))
}

async fn cancel_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.cancel(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ActiveBody {
    active: usize,
}

async fn active_workflows(State(state): State<Arc<AppState>>) -> Json<ActiveBody> {
    Json(ActiveBody {
        active: state.orchestrator.active_count().await,
    })
}

async fn clear_conversation(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .memory
        .clear_conversation(&user_id)
        .await
        .map_err(AgentError::from)?;
    info!(user_id = %user_id, "Conversation cleared");
    Ok(StatusCode::NO_CONTENT)
}

/// SSE tail of the user's progress stream: retained history first, then
/// live events.
async fn progress_stream(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (history, receiver) = state.bus.subscribe(&user_id).await;

    let history_stream = stream::iter(history);
    let live_stream = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((event, receiver)),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Progress subscriber lagged");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    let events = history_stream.chain(live_stream).map(|update| {
        let event = Event::default()
            .event("agent_update")
            .json_data(&update)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Progress event serialization failed");
                Event::default().comment("serialization error")
            });
        Ok(event)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    database: bool,
    llm: bool,
}

/// Functional health check: verifies database and LLM reachability.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = state.db.query_json("INFO FOR DB").await.is_ok();

    let llm = match tokio::time::timeout(HEALTH_PROBE_BUDGET, state.provider.test_connection())
        .await
    {
        Ok(Ok(reachable)) => reachable,
        _ => false,
    };

    let healthy = database && llm;
    let body = HealthBody {
        status: if healthy { "ok" } else { "degraded" },
        database,
        llm,
    };
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (AgentError::validation("x", "bad"), StatusCode::BAD_REQUEST),
            (AgentError::not_found("x", "missing"), StatusCode::NOT_FOUND),
            (
                AgentError::timeout(codes::DEADLINE, "slow"),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (AgentError::external("x", "boom"), StatusCode::BAD_GATEWAY),
            (
                AgentError::internal("x", "bug"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
