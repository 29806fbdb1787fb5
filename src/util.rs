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

//! Per-request call bounds: the outer deadline and the cancellation token
//! every outbound collaborator call must honour.

use crate::error::{codes, AgentError, AgentResult};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// An absolute point in time by which a request must finish.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `duration` from now.
    pub fn after(duration: Duration) -> Self {
        Self {
            at: Instant::now() + duration,
        }
    }

    /// Time left before the deadline; zero once elapsed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// True once the deadline has elapsed.
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// A stage-local budget that never exceeds the remaining outer budget.
    pub fn bounded(&self, stage_budget: Duration) -> Duration {
        stage_budget.min(self.remaining())
    }
}

/// Cancellation token plus deadline, cloned into every stage.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Per-workflow cancellation token
    pub cancel: CancellationToken,
    /// Outer request deadline
    pub deadline: Deadline,
}

impl CallContext {
    /// Creates a context with a fresh token and the given outer budget.
    pub fn new(outer_budget: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Deadline::after(outer_budget),
        }
    }

    /// Creates a context from an existing token.
    pub fn with_token(cancel: CancellationToken, outer_budget: Duration) -> Self {
        Self {
            cancel,
            deadline: Deadline::after(outer_budget),
        }
    }

    /// Errors out when the workflow has been cancelled.
    pub fn ensure_active(&self, workflow_id: &str) -> AgentResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::cancelled(workflow_id));
        }
        Ok(())
    }
}

/// Runs a collaborator call under the context's cancellation token and a
/// stage budget clamped to the remaining outer deadline.
///
/// The future's own error is passed through; elapsed budget maps to a
/// `timeout` error and cancellation to the cancellation marker.
pub async fn run_bounded<F, T>(
    ctx: &CallContext,
    stage_budget: Duration,
    label: &str,
    fut: F,
) -> AgentResult<T>
where
    F: Future<Output = AgentResult<T>>,
{
    let budget = ctx.deadline.bounded(stage_budget);
    if budget.is_zero() {
        return Err(AgentError::timeout(
            codes::DEADLINE,
            format!("No time budget left for {}", label),
        ));
    }

    tokio::select! {
        _ = ctx.cancel.cancelled() => Err(AgentError::cancelled(label)),
        result = tokio::time::timeout(budget, fut) => match result {
            Ok(inner) => inner,
            Err(_) => Err(AgentError::timeout(
                codes::DEADLINE,
                format!("{} timed out after {}ms", label, budget.as_millis()),
            )),
        },
    }
}
