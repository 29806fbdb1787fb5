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

//! Embedded SurrealDB client.
//!
//! All persistence (conversations, workflow state, vector collections) goes
//! through this client. Queries bind parameters instead of interpolating
//! values, and results come back as JSON values first to keep custom
//! deserializers in control.

use anyhow::Result;
use surrealdb::{
    engine::local::{Db, RocksDb},
    Surreal,
};
use tracing::{debug, error, info, instrument};

/// Database client for SurrealDB embedded operations
pub struct DBClient {
    pub db: Surreal<Db>,
}

impl DBClient {
    /// Creates a new database client and connects to the specified path
    #[instrument(name = "db_client_new", skip_all, fields(db_path = %path))]
    pub async fn new(path: &str) -> Result<Self> {
        info!("Initializing SurrealDB connection");

        let db = Surreal::new::<RocksDb>(path).await.map_err(|e| {
            error!(error = %e, "Failed to connect to SurrealDB");
            e
        })?;

        db.use_ns("newsmind").use_db("core").await.map_err(|e| {
            error!(error = %e, "Failed to select namespace/database");
            e
        })?;

        info!("SurrealDB connection established");
        Ok(Self { db })
    }

    /// Initializes the database schema, sizing the vector indexes to the
    /// configured embedding dimension.
    #[instrument(name = "db_initialize_schema", skip(self))]
    pub async fn initialize_schema(&self, embedding_dimension: usize) -> Result<()> {
        use super::schema::schema_sql;

        info!(embedding_dimension, "Initializing database schema");

        self.db
            .query(schema_sql(embedding_dimension))
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to initialize schema");
                e
            })?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Executes a raw query and returns results as JSON values.
    #[instrument(name = "db_query_json", skip(self), fields(query_len = query.len()))]
    pub async fn query_json(&self, query: &str) -> Result<Vec<serde_json::Value>> {
        self.query_json_with_params(query, Vec::new()).await
    }

    /// Executes a query with bound parameters and returns JSON values.
    #[instrument(
        name = "db_query_json_params",
        skip(self, params),
        fields(query_len = query.len(), param_count = params.len())
    )]
    pub async fn query_json_with_params(
        &self,
        query: &str,
        params: Vec<(String, serde_json::Value)>,
    ) -> Result<Vec<serde_json::Value>> {
        debug!(query_preview = %query.chars().take(100).collect::<String>(), "Executing query");

        let mut prepared = self.db.query(query);
        for (name, value) in params {
            prepared = prepared.bind((name, value));
        }

        let mut result = prepared.await.map_err(|e| {
            error!(error = %e, "Query execution failed");
            e
        })?;

        let data: Vec<serde_json::Value> = result.take(0).map_err(|e| {
            error!(error = %e, "Failed to extract query results");
            e
        })?;

        debug!(result_count = data.len(), "Query completed");
        Ok(data)
    }

    /// Executes a query without deserializing the result.
    ///
    /// Use this for UPSERT, CREATE, UPDATE, DELETE operations where you
    /// don't need the returned data.
    #[instrument(name = "db_execute", skip(self, params), fields(query_len = query.len()))]
    pub async fn execute(
        &self,
        query: &str,
        params: Vec<(String, serde_json::Value)>,
    ) -> Result<()> {
        debug!(query_preview = %query.chars().take(100).collect::<String>(), "Executing query (no result)");

        let mut prepared = self.db.query(query);
        for (name, value) in params {
            prepared = prepared.bind((name, value));
        }

        prepared.await.map_err(|e| {
            error!(error = %e, "Query execution failed");
            e
        })?;

        debug!("Query executed successfully");
        Ok(())
    }

    /// Deletes a record by table and id.
    #[instrument(name = "db_delete", skip(self), fields(table = %table, record_id = %id))]
    pub async fn delete_record(&self, table: &str, id: &str) -> Result<()> {
        self.execute(
            "DELETE type::thing($table, $id)",
            vec![
                ("table".to_string(), serde_json::json!(table)),
                ("id".to_string(), serde_json::json!(id)),
            ],
        )
        .await
    }
}
