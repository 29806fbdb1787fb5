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

//! Scrape enrichment stage (optional): fill in full article bodies.
//!
//! Never fails the pipeline. Articles whose scrape fails keep whatever
//! content they already had.

use super::StageGuard;
use crate::models::workflow::WorkflowContext;
use crate::util::CallContext;
use crate::workflow::progress::{stage, ProgressEmitter};
use crate::workflow::PipelineDeps;
use tracing::{debug, info};

/// Runs the scrape enrichment stage.
pub async fn run(
    context: &mut WorkflowContext,
    deps: &PipelineDeps,
    emitter: &ProgressEmitter,
    call: &CallContext,
) {
    let guard =
        StageGuard::begin(emitter, stage::SCRAPE_ENRICHER, "Fetching full article text").await;

    if context.articles.is_empty() || call.cancel.is_cancelled() {
        guard.complete(context, "Nothing to enrich").await;
        return;
    }

    let urls: Vec<String> = context.articles.iter().map(|a| a.url.clone()).collect();
    let total = urls.len();

    let batch = tokio::select! {
        _ = call.cancel.cancelled() => {
            guard.complete(context, "Enrichment interrupted").await;
            return;
        }
        batch = deps.scraper.scrape_many(&urls) => batch,
    };

    let mut enriched = 0usize;
    for page in &batch.ok {
        if let Some(article) = context.articles.iter_mut().find(|a| a.url == page.url) {
            article.content = Some(page.content.clone());
            enriched += 1;
        }
    }
    for (url, error) in &batch.failed {
        debug!(url = %url, error = %error, "Scrape failed, keeping existing content");
    }

    context.stats.api_calls += total as u32;

    info!(enriched, total, "Scrape enrichment finished");
    guard
        .complete(context, format!("Enriched {}/{} articles", enriched, total))
        .await;
}
