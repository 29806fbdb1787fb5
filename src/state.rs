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

//! Application state: the wired collaborator set shared by the HTTP
//! handlers.

use crate::config::Config;
use crate::db::{DBClient, MemoryStore, SurrealMemoryStore, SurrealVectorStore};
use crate::llm::{
    CircuitBreaker, CircuitBreakerConfig, HttpEmbedder, LlmIntelligence, LlmProvider,
    OpenAiCompatibleProvider,
};
use crate::scrape::HttpScraper;
use crate::search::{NewsApiClient, VideoApiClient};
use crate::workflow::{PipelineDeps, ProgressBus, WorkflowOrchestrator, WorkflowRegistry};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
pub struct AppState {
    /// Runtime configuration
    pub config: Config,
    /// Database client (health checks)
    pub db: Arc<DBClient>,
    /// LLM provider (health checks)
    pub provider: Arc<dyn LlmProvider>,
    /// Conversation persistence (explicit clear endpoint)
    pub memory: Arc<dyn MemoryStore>,
    /// Workflow orchestrator
    pub orchestrator: Arc<WorkflowOrchestrator>,
    /// Progress event bus
    pub bus: Arc<ProgressBus>,
}

impl AppState {
    /// Builds the full collaborator graph from configuration.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db = Arc::new(DBClient::new(&config.db_path).await?);
        db.initialize_schema(config.embedding_dimension).await?;

        let http_client = Arc::new(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(concat!("newsmind/", env!("CARGO_PKG_VERSION")))
                .build()?,
        );

        let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(
            "llm",
            &config.llm_base_url,
            &config.llm_api_key,
            &config.llm_model,
            http_client.clone(),
        ));
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default(), "llm".to_string());
        let intelligence = Arc::new(LlmIntelligence::new(provider.clone(), breaker));

        let embedder = Arc::new(HttpEmbedder::new(
            &config.llm_base_url,
            &config.llm_api_key,
            &config.embedding_model,
            config.embedding_dimension,
            http_client.clone(),
        ));

        let news = Arc::new(NewsApiClient::new(
            &config.news_base_url,
            &config.news_api_key,
            http_client.clone(),
        ));
        let videos = Arc::new(VideoApiClient::new(
            &config.video_base_url,
            &config.video_api_key,
            http_client.clone(),
        ));
        let scraper = Arc::new(HttpScraper::new(http_client));

        let memory: Arc<dyn MemoryStore> = Arc::new(SurrealMemoryStore::new(db.clone()));
        let vectors = Arc::new(SurrealVectorStore::new(db.clone()));

        let deps = Arc::new(PipelineDeps {
            intelligence,
            embedder,
            news,
            videos,
            scraper,
            memory: memory.clone(),
            vectors,
        });

        let registry = Arc::new(WorkflowRegistry::new());
        let bus = Arc::new(ProgressBus::new());
        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            deps,
            registry,
            bus.clone(),
            config.request_timeout,
            config.shutdown_grace,
        ));

        Ok(Self {
            config,
            db,
            provider,
            memory,
            orchestrator,
            bus,
        })
    }
}
