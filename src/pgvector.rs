//! PostgreSQL + pgvector index backend.
//!
//! Only available with the `pgvector` feature. Each index is stored as its
//! own table `rag_{name}` with an `embedding vector(n)` column; the
//! declared dimension is read back from the column type, so dimension
//! checks hold across process restarts.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::document::{IndexEntry, SearchHit};
use crate::error::{Result, RetrievalError};
use crate::index::VectorIndex;

const BACKEND: &str = "pgvector";

/// A [`VectorIndex`] backed by PostgreSQL with the pgvector extension.
pub struct PgVectorIndex {
    pool: PgPool,
}

impl PgVectorIndex {
    /// Connect to the given database URL with a small shared pool.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] if the connection cannot be
    /// established.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| RetrievalError::Store {
                backend: BACKEND.to_string(),
                message: format!("failed to connect: {e}"),
            })?;
        Ok(Self { pool })
    }

    /// Connect using the store connection string from a
    /// [`RetrievalConfig`].
    pub async fn from_config(config: &RetrievalConfig) -> Result<Self> {
        let url = config.store_connection.as_deref().ok_or_else(|| {
            RetrievalError::Config("no store connection configured".to_string())
        })?;
        Self::connect(url).await
    }

    /// Wrap an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn store_err(e: sqlx::Error) -> RetrievalError {
        RetrievalError::Store {
            backend: BACKEND.to_string(),
            message: e.to_string(),
        }
    }

    /// Map an index name to its table name: `rag_` plus the name with every
    /// character outside `[A-Za-z0-9_]` replaced by `_`.
    fn table_name(name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(RetrievalError::Config(
                "index name must not be empty".to_string(),
            ));
        }
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        Ok(format!("rag_{}", sanitized.to_lowercase()))
    }

    /// Declared vector dimension of an existing index table, or `None` when
    /// the table does not exist. pgvector records the dimension as the
    /// column's type modifier.
    async fn declared_dimension(&self, table: &str) -> Result<Option<usize>> {
        let row = sqlx::query(
            "SELECT atttypmod AS dim FROM pg_attribute \
             WHERE attrelid = to_regclass($1) AND attname = 'embedding'",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(row.map(|r| r.get::<i32, _>("dim") as usize))
    }
}

/// pgvector's text representation of a vector, `[v1,v2,...]`.
fn vector_literal(vector: &[f32]) -> String {
    let elements: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", elements.join(","))
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn create_index(&self, name: &str, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(RetrievalError::Config(
                "index dimension must be greater than zero".to_string(),
            ));
        }
        let table = Self::table_name(name)?;

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(Self::store_err)?;

        if let Some(existing) = self.declared_dimension(&table).await? {
            if existing != dimension {
                return Err(RetrievalError::Config(format!(
                    "index '{name}' already exists with dimension {existing}, requested {dimension}"
                )));
            }
            debug!(index = name, dimension, "index already exists");
            return Ok(());
        }

        let create_sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
                id TEXT PRIMARY KEY, \
                text TEXT NOT NULL, \
                embedding vector({dimension}) NOT NULL, \
                metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb, \
                document_id TEXT NOT NULL\
            )"
        );
        sqlx::query(&create_sql)
            .execute(&self.pool)
            .await
            .map_err(Self::store_err)?;

        debug!(index = name, table = %table, dimension, "created index table");
        Ok(())
    }

    async fn upsert(&self, name: &str, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let table = Self::table_name(name)?;
        let dimension = self
            .declared_dimension(&table)
            .await?
            .ok_or_else(|| RetrievalError::IndexNotFound {
                index: name.to_string(),
            })?;
        for entry in entries {
            if entry.vector.len() != dimension {
                return Err(RetrievalError::Store {
                    backend: BACKEND.to_string(),
                    message: format!(
                        "entry '{}' has dimension {}, index '{name}' expects {dimension}",
                        entry.id,
                        entry.vector.len()
                    ),
                });
            }
        }

        let upsert_sql = format!(
            "INSERT INTO {table} (id, text, embedding, metadata, document_id) \
             VALUES ($1, $2, $3::vector, $4::jsonb, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                text = EXCLUDED.text, \
                embedding = EXCLUDED.embedding, \
                metadata = EXCLUDED.metadata, \
                document_id = EXCLUDED.document_id"
        );

        // One transaction per batch, so a document's chunks land together
        // or not at all.
        let mut tx = self.pool.begin().await.map_err(Self::store_err)?;
        for entry in entries {
            let metadata_json =
                serde_json::to_string(&entry.metadata).unwrap_or_else(|_| "{}".to_string());
            sqlx::query(&upsert_sql)
                .bind(&entry.id)
                .bind(&entry.text)
                .bind(vector_literal(&entry.vector))
                .bind(metadata_json)
                .bind(&entry.document_id)
                .execute(&mut *tx)
                .await
                .map_err(Self::store_err)?;
        }
        tx.commit().await.map_err(Self::store_err)?;

        debug!(index = name, count = entries.len(), "upserted entries");
        Ok(())
    }

    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let table = Self::table_name(name)?;
        let dimension = self
            .declared_dimension(&table)
            .await?
            .ok_or_else(|| RetrievalError::IndexNotFound {
                index: name.to_string(),
            })?;
        if vector.len() != dimension {
            return Err(RetrievalError::Config(format!(
                "query vector has dimension {}, index '{name}' expects {dimension}",
                vector.len()
            )));
        }

        // `<=>` is cosine distance, 0 for identical vectors, so the score
        // is 1 - distance. The trailing `id` makes equal distances
        // deterministic.
        let search_sql = format!(
            "SELECT id, text, metadata, document_id, \
                    1 - (embedding <=> $1::vector) AS score \
             FROM {table} \
             ORDER BY embedding <=> $1::vector, id \
             LIMIT $2"
        );

        let rows = sqlx::query(&search_sql)
            .bind(vector_literal(vector))
            .bind(top_k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::store_err)?;

        let hits = rows
            .iter()
            .map(|row| {
                let metadata_value: serde_json::Value = row.get("metadata");
                let metadata: HashMap<String, String> = metadata_value
                    .as_object()
                    .map(|obj| {
                        obj.iter()
                            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                            .collect()
                    })
                    .unwrap_or_default();
                SearchHit {
                    id: row.get("id"),
                    text: row.get("text"),
                    document_id: row.get("document_id"),
                    metadata,
                    score: row.get::<f64, _>("score") as f32,
                }
            })
            .collect();

        Ok(hits)
    }
}
