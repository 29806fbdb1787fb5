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

//! Database schema.
//!
//! The HNSW vector indexes are sized at startup from the configured
//! embedding dimension, so the schema is a function rather than a constant.

/// Builds the full schema statement block.
pub fn schema_sql(embedding_dimension: usize) -> String {
    format!(
        r#"
-- Namespace and database
DEFINE NAMESPACE IF NOT EXISTS newsmind;
USE NS newsmind;
DEFINE DATABASE IF NOT EXISTS core;
USE DB core;

-- Table: conversation (one row per user, replaced atomically on save)
DEFINE TABLE OVERWRITE conversation SCHEMAFULL;
DEFINE FIELD OVERWRITE user_id ON conversation TYPE string;
DEFINE FIELD OVERWRITE context ON conversation FLEXIBLE TYPE object;
DEFINE FIELD OVERWRITE expires_at ON conversation TYPE datetime;
DEFINE FIELD OVERWRITE updated_at ON conversation TYPE datetime DEFAULT time::now();
DEFINE INDEX OVERWRITE conversation_user_idx ON conversation FIELDS user_id UNIQUE;

-- Table: workflow_state (debugging snapshots, short lived)
DEFINE TABLE OVERWRITE workflow_state SCHEMAFULL;
DEFINE FIELD OVERWRITE workflow_id ON workflow_state TYPE string;
DEFINE FIELD OVERWRITE user_id ON workflow_state TYPE string;
DEFINE FIELD OVERWRITE status ON workflow_state TYPE string
    ASSERT $value IN ['pending', 'processing', 'completed', 'failed', 'cancelled', 'timeout'];
DEFINE FIELD OVERWRITE context ON workflow_state FLEXIBLE TYPE object;
DEFINE FIELD OVERWRITE expires_at ON workflow_state TYPE datetime;
DEFINE FIELD OVERWRITE updated_at ON workflow_state TYPE datetime DEFAULT time::now();
DEFINE INDEX OVERWRITE workflow_state_id_idx ON workflow_state FIELDS workflow_id UNIQUE;

-- Table: article_vec (fresh article corpus with embeddings)
DEFINE TABLE OVERWRITE article_vec SCHEMAFULL;
DEFINE FIELD OVERWRITE item ON article_vec FLEXIBLE TYPE object;
DEFINE FIELD OVERWRITE source ON article_vec TYPE string;
DEFINE FIELD OVERWRITE category ON article_vec TYPE option<string>;
DEFINE FIELD OVERWRITE published_at ON article_vec TYPE option<datetime>;
DEFINE FIELD OVERWRITE embedding ON article_vec TYPE array<float>;
DEFINE FIELD OVERWRITE created_at ON article_vec TYPE datetime DEFAULT time::now();
DEFINE INDEX OVERWRITE article_vec_idx ON article_vec
    FIELDS embedding HNSW DIMENSION {dim} DIST COSINE;
DEFINE INDEX OVERWRITE article_vec_published_idx ON article_vec FIELDS published_at;

-- Table: video_vec (fresh video corpus with embeddings)
DEFINE TABLE OVERWRITE video_vec SCHEMAFULL;
DEFINE FIELD OVERWRITE item ON video_vec FLEXIBLE TYPE object;
DEFINE FIELD OVERWRITE channel_id ON video_vec TYPE string;
DEFINE FIELD OVERWRITE published_at ON video_vec TYPE option<datetime>;
DEFINE FIELD OVERWRITE embedding ON video_vec TYPE array<float>;
DEFINE FIELD OVERWRITE created_at ON video_vec TYPE datetime DEFAULT time::now();
DEFINE INDEX OVERWRITE video_vec_idx ON video_vec
    FIELDS embedding HNSW DIMENSION {dim} DIST COSINE;
"#,
        dim = embedding_dimension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_embeds_dimension() {
        let sql = schema_sql(1536);
        assert_eq!(sql.matches("DIMENSION 1536").count(), 2);
    }

    #[test]
    fn test_schema_defines_all_tables() {
        let sql = schema_sql(8);
        for table in ["conversation", "workflow_state", "article_vec", "video_vec"] {
            assert!(
                sql.contains(&format!("DEFINE TABLE OVERWRITE {} SCHEMAFULL", table)),
                "missing table {}",
                table
            );
        }
    }
}
