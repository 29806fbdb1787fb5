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

//! The conversational multi-agent workflow engine.
//!
//! - [`orchestrator`] - request lifecycle (execute, cancel, status, close)
//! - [`pipeline`] / [`stages`] - the intent-driven control-flow graph
//! - [`registry`] - live-workflow registry
//! - [`progress`] - branch tables, progress fractions and the event bus

pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod stages;

pub use orchestrator::WorkflowOrchestrator;
pub use progress::{ProgressBus, ProgressEmitter};
pub use registry::{WorkflowHandle, WorkflowRegistry, WorkflowSnapshot};

use crate::db::{MemoryStore, VectorStore};
use crate::llm::{Embedder, NewsIntelligence};
use crate::scrape::Scraper;
use crate::search::{NewsSearch, VideoSearch};
use std::sync::Arc;

/// The collaborator set every stage works against.
///
/// All fields are capability traits, so tests can substitute in-process
/// fakes for any subset.
pub struct PipelineDeps {
    /// Typed LLM operations
    pub intelligence: Arc<dyn NewsIntelligence>,
    /// Embedding generation
    pub embedder: Arc<dyn Embedder>,
    /// News search provider
    pub news: Arc<dyn NewsSearch>,
    /// Video search provider
    pub videos: Arc<dyn VideoSearch>,
    /// Article body scraper
    pub scraper: Arc<dyn Scraper>,
    /// Conversation and workflow-state persistence
    pub memory: Arc<dyn MemoryStore>,
    /// Vector collections
    pub vectors: Arc<dyn VectorStore>,
}
