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

//! SurrealDB persistence: client, schema, and the memory/vector gateways.

pub mod client;
pub mod memory_store;
pub mod schema;
pub mod vector_store;

pub use client::DBClient;
pub use memory_store::{MemoryStore, SurrealMemoryStore};
pub use vector_store::{SurrealVectorStore, VectorCollection, VectorFilter, VectorStore};

use crate::error::{AgentError, ErrorKind};
use thiserror::Error;

/// Errors from the persistence gateways
#[derive(Debug, Error)]
pub enum StoreError {
    /// Query execution failed
    #[error("Store query failed: {0}")]
    Query(String),

    /// Stored payload did not round-trip
    #[error("Store serialization failed: {0}")]
    Serialization(String),

    /// Caller violated a call precondition
    #[error("Store precondition violated: {0}")]
    Precondition(String),

    /// Filter used an unsupported operator
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<StoreError> for AgentError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::Precondition(_) | StoreError::UnsupportedFilter(_) => ErrorKind::Validation,
            StoreError::Serialization(_) => ErrorKind::Internal,
            StoreError::Query(_) => ErrorKind::External,
        };
        AgentError::new(kind, "store_failed", err.to_string()).with_source(err)
    }
}
