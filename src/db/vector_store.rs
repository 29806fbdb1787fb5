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

//! Vector collections for the fresh article/video corpus.
//!
//! Writes upsert by the item's deterministic id (article URL hash, video
//! id), so re-ingesting the same story never duplicates. Similarity queries
//! use cosine similarity; the filter language is equality on indexed
//! metadata fields plus `$gte` on `published_at`, and unknown operators are
//! rejected.

use super::{DBClient, StoreError};
use crate::models::news::NewsArticle;
use crate::models::video::Video;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The two named collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorCollection {
    /// Fresh news articles
    Articles,
    /// Fresh videos
    Videos,
}

impl VectorCollection {
    fn table(&self) -> &'static str {
        match self {
            VectorCollection::Articles => "article_vec",
            VectorCollection::Videos => "video_vec",
        }
    }

    fn filterable_fields(&self) -> &'static [&'static str] {
        match self {
            VectorCollection::Articles => &["source", "category", "published_at"],
            VectorCollection::Videos => &["channel_id", "published_at"],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(String, serde_json::Value),
    Gte(String, serde_json::Value),
}

/// Metadata filter for similarity queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFilter {
    conditions: Vec<Condition>,
}

impl VectorFilter {
    /// An empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    pub fn eq(mut self, field: &str, value: serde_json::Value) -> Self {
        self.conditions
            .push(Condition::Eq(field.to_string(), value));
        self
    }

    /// Adds a `published_at >= ts` recency condition.
    pub fn published_since(mut self, ts: chrono::DateTime<chrono::Utc>) -> Self {
        self.conditions.push(Condition::Gte(
            "published_at".to_string(),
            serde_json::json!(ts.to_rfc3339()),
        ));
        self
    }

    /// Parses a wire-level filter map. Plain values mean equality; an object
    /// value may carry the `$gte` operator on `published_at`. Anything else
    /// is rejected.
    pub fn from_json(
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, StoreError> {
        let mut filter = VectorFilter::new();
        for (field, value) in map {
            match value {
                serde_json::Value::Object(ops) => {
                    for (op, operand) in ops {
                        match op.as_str() {
                            "$gte" if field == "published_at" => {
                                filter
                                    .conditions
                                    .push(Condition::Gte(field.clone(), operand.clone()));
                            }
                            "$gte" => {
                                return Err(StoreError::UnsupportedFilter(format!(
                                    "$gte is only supported on published_at, not {}",
                                    field
                                )))
                            }
                            other => {
                                return Err(StoreError::UnsupportedFilter(format!(
                                    "Unknown operator {} on {}",
                                    other, field
                                )))
                            }
                        }
                    }
                }
                plain => {
                    filter
                        .conditions
                        .push(Condition::Eq(field.clone(), plain.clone()));
                }
            }
        }
        Ok(filter)
    }

    /// Renders the filter as a WHERE fragment plus bound parameters.
    fn to_clause(
        &self,
        collection: VectorCollection,
    ) -> Result<(String, Vec<(String, serde_json::Value)>), StoreError> {
        let mut fragments = Vec::new();
        let mut params = Vec::new();

        for (i, condition) in self.conditions.iter().enumerate() {
            let (field, value, op) = match condition {
                Condition::Eq(f, v) => (f, v, "="),
                Condition::Gte(f, v) => (f, v, ">="),
            };

            if !collection.filterable_fields().contains(&field.as_str()) {
                return Err(StoreError::UnsupportedFilter(format!(
                    "Field {} is not filterable on {}",
                    field,
                    collection.table()
                )));
            }

            let param = format!("filter_{}", i);
            if field == "published_at" {
                fragments.push(format!(
                    "({field} != NONE AND {field} {op} <datetime> ${param})",
                    field = field,
                    op = op,
                    param = param
                ));
            } else {
                fragments.push(format!("{} {} ${}", field, op, param));
            }
            params.push((param, value.clone()));
        }

        Ok((fragments.join(" AND "), params))
    }
}

/// One similarity hit.
#[derive(Debug, Clone)]
pub struct Scored<T> {
    /// The reconstructed item
    pub item: T,
    /// Similarity in [0, 1]
    pub similarity: f64,
    /// Cosine distance the similarity was derived from
    pub distance: f64,
}

/// Vector-store capability over the two collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Stores articles with their embeddings. Pre: equal-length, non-empty.
    async fn store_articles(
        &self,
        articles: &[NewsArticle],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError>;

    /// Stores videos with their embeddings. Pre: equal-length, non-empty.
    async fn store_videos(
        &self,
        videos: &[Video],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError>;

    /// Returns the `top_k` most similar articles to the query embedding
    async fn similar_articles(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<Scored<NewsArticle>>, StoreError>;

    /// Returns the `top_k` most similar videos to the query embedding
    async fn similar_videos(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<Scored<Video>>, StoreError>;

    /// Deletes items by id from a collection
    async fn delete(
        &self,
        collection: VectorCollection,
        ids: &[String],
    ) -> Result<(), StoreError>;
}

/// [`VectorStore`] over the embedded database.
pub struct SurrealVectorStore {
    db: Arc<DBClient>,
}

impl SurrealVectorStore {
    /// Creates a store over a shared client.
    pub fn new(db: Arc<DBClient>) -> Self {
        Self { db }
    }

    fn check_preconditions(
        items_len: usize,
        embeddings_len: usize,
        what: &str,
    ) -> Result<(), StoreError> {
        if items_len == 0 || embeddings_len == 0 {
            return Err(StoreError::Precondition(format!(
                "{} write requires non-empty items and embeddings",
                what
            )));
        }
        if items_len != embeddings_len {
            return Err(StoreError::Precondition(format!(
                "{} write requires equal lengths, got {} items and {} embeddings",
                what, items_len, embeddings_len
            )));
        }
        Ok(())
    }

    async fn query_similar<T: DeserializeOwned>(
        &self,
        collection: VectorCollection,
        query_embedding: &[f32],
        top_k: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<Scored<T>>, StoreError> {
        let (filter_clause, mut params) = match filter {
            Some(f) => f.to_clause(collection)?,
            None => (String::new(), Vec::new()),
        };

        let mut where_clause = "embedding != NONE".to_string();
        if !filter_clause.is_empty() {
            where_clause.push_str(" AND ");
            where_clause.push_str(&filter_clause);
        }

        let query = format!(
            "SELECT item, vector::similarity::cosine(embedding, $query_embedding) AS similarity \
             FROM {table} \
             WHERE {where_clause} \
             ORDER BY similarity DESC \
             LIMIT {top_k}",
            table = collection.table(),
            where_clause = where_clause,
            top_k = top_k
        );
        params.push((
            "query_embedding".to_string(),
            serde_json::json!(query_embedding),
        ));

        let rows = self.db.query_json_with_params(&query, params).await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let similarity = row["similarity"].as_f64().unwrap_or(0.0);
            let distance = 1.0 - similarity;
            match serde_json::from_value::<T>(row["item"].clone()) {
                Ok(item) => hits.push(Scored {
                    item,
                    similarity: similarity.max(0.0),
                    distance,
                }),
                Err(e) => warn!(error = %e, "Dropping row that failed to deserialize"),
            }
        }

        debug!(
            collection = collection.table(),
            count = hits.len(),
            "Similarity query completed"
        );
        Ok(hits)
    }
}

#[async_trait]
impl VectorStore for SurrealVectorStore {
    #[instrument(name = "store_articles", skip_all, fields(count = articles.len()))]
    async fn store_articles(
        &self,
        articles: &[NewsArticle],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        Self::check_preconditions(articles.len(), embeddings.len(), "Article")?;

        for (article, embedding) in articles.iter().zip(embeddings) {
            self.db
                .execute(
                    "UPSERT type::thing('article_vec', $id) CONTENT { \
                         item: $item, source: $source, category: $category, \
                         published_at: IF $published != NONE THEN <datetime> $published ELSE NONE END, \
                         embedding: $embedding, created_at: time::now() }",
                    vec![
                        ("id".to_string(), serde_json::json!(article.id)),
                        ("item".to_string(), serde_json::to_value(article)?),
                        ("source".to_string(), serde_json::json!(article.source)),
                        ("category".to_string(), serde_json::json!(article.category)),
                        (
                            "published".to_string(),
                            serde_json::json!(article.published_at.map(|t| t.to_rfc3339())),
                        ),
                        ("embedding".to_string(), serde_json::json!(embedding)),
                    ],
                )
                .await?;
        }

        info!(count = articles.len(), "Articles stored");
        Ok(())
    }

    #[instrument(name = "store_videos", skip_all, fields(count = videos.len()))]
    async fn store_videos(
        &self,
        videos: &[Video],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        Self::check_preconditions(videos.len(), embeddings.len(), "Video")?;

        for (video, embedding) in videos.iter().zip(embeddings) {
            self.db
                .execute(
                    "UPSERT type::thing('video_vec', $id) CONTENT { \
                         item: $item, channel_id: $channel, \
                         published_at: IF $published != NONE THEN <datetime> $published ELSE NONE END, \
                         embedding: $embedding, created_at: time::now() }",
                    vec![
                        ("id".to_string(), serde_json::json!(video.id)),
                        ("item".to_string(), serde_json::to_value(video)?),
                        ("channel".to_string(), serde_json::json!(video.channel_id)),
                        (
                            "published".to_string(),
                            serde_json::json!(video.published_at.map(|t| t.to_rfc3339())),
                        ),
                        ("embedding".to_string(), serde_json::json!(embedding)),
                    ],
                )
                .await?;
        }

        info!(count = videos.len(), "Videos stored");
        Ok(())
    }

    async fn similar_articles(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<Scored<NewsArticle>>, StoreError> {
        self.query_similar(VectorCollection::Articles, query_embedding, top_k, filter)
            .await
    }

    async fn similar_videos(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<Scored<Video>>, StoreError> {
        self.query_similar(VectorCollection::Videos, query_embedding, top_k, filter)
            .await
    }

    #[instrument(name = "vector_delete", skip(self, ids), fields(count = ids.len()))]
    async fn delete(
        &self,
        collection: VectorCollection,
        ids: &[String],
    ) -> Result<(), StoreError> {
        for id in ids {
            self.db.delete_record(collection.table(), id).await?;
        }
        Ok(())
    }
}
