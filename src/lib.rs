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

//! # Newsmind Core
//!
//! Backend for a conversational AI news assistant: a request-scoped
//! multi-agent workflow engine that classifies intent, retrieves and ranks
//! fresh news and video coverage, and streams progress events while
//! assembling a personality-styled answer.
//!
//! ## Modules
//!
//! - [`workflow`] - the orchestration engine: orchestrator, pipeline,
//!   stages, live-workflow registry, progress streaming
//! - [`models`] - workflow context, conversation memory, articles, videos,
//!   progress events
//! - [`llm`] - LLM and embedding capabilities with retry and circuit
//!   breaking
//! - [`search`] - news and video search capabilities
//! - [`scrape`] - article body extraction
//! - [`db`] - SurrealDB persistence: conversations, workflow state, vector
//!   collections
//! - [`http`] - thin axum adapter (REST + SSE)
//!
//! ## Architecture
//!
//! A [`WorkflowOrchestrator`](workflow::WorkflowOrchestrator) owns each
//! request's [`WorkflowContext`](models::WorkflowContext); the
//! [`WorkflowRegistry`](workflow::WorkflowRegistry) holds only cancel
//! handles and status snapshots. Stages talk to collaborators exclusively
//! through the capability traits carried in
//! [`PipelineDeps`](workflow::PipelineDeps).

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod llm;
pub mod models;
pub mod scrape;
pub mod search;
pub mod state;
pub mod util;
pub mod workflow;

pub use config::Config;
pub use error::{AgentError, AgentResult, ErrorKind};
pub use state::AppState;
pub use workflow::{PipelineDeps, ProgressBus, WorkflowOrchestrator, WorkflowRegistry};
