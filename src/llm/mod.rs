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

//! LLM and embedding capabilities.
//!
//! - [`provider`] - low-level completion trait and errors
//! - [`openai_compatible`] - reqwest adapter for OpenAI-style APIs
//! - [`embedding`] - embedding capability and its HTTP adapter
//! - [`intelligence`] - the typed, domain-level operations the pipeline uses
//! - [`prompts`] / [`parse`] - prompt templating and defensive JSON decoding
//! - [`retry`] / [`circuit_breaker`] - resilience around provider calls

pub mod circuit_breaker;
pub mod embedding;
pub mod intelligence;
pub mod openai_compatible;
pub mod parse;
pub mod prompts;
pub mod provider;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use embedding::{Embedder, EmbeddingError, HttpEmbedder, EMBEDDING_CONCURRENCY};
pub use intelligence::{IntentClassification, LlmIntelligence, NewsIntelligence};
pub use openai_compatible::OpenAiCompatibleProvider;
pub use provider::{LlmError, LlmProvider, LlmResponse};
pub use retry::RetryConfig;
