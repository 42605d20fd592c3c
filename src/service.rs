//! Retrieval service orchestration.
//!
//! [`RetrievalService`] composes an [`Embedder`] and a [`VectorIndex`]
//! behind the two operations the rest of the system calls: ingestion and
//! retrieval. Both collaborators are injected once at construction and
//! shared across calls; every remote call is bounded by the configured
//! request timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info};

use crate::chunking::{chunk, ChunkConfig};
use crate::config::RetrievalConfig;
use crate::document::{Document, IndexEntry, SearchHit};
use crate::embedding::Embedder;
use crate::error::{ProviderErrorKind, Result, RetrievalError};
use crate::index::VectorIndex;

/// The retrieval pipeline: chunk, embed, index, query.
pub struct RetrievalService {
    config: RetrievalConfig,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl RetrievalService {
    /// Start building a service.
    pub fn builder() -> RetrievalServiceBuilder {
        RetrievalServiceBuilder::default()
    }

    /// The service configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// The injected embedding client.
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// The injected vector index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Ingest one document into the named index with the configured
    /// chunking. Returns the number of chunks indexed.
    pub async fn ingest(&self, index_name: &str, document: &Document) -> Result<usize> {
        self.ingest_with(index_name, document, &self.config.chunk)
            .await
    }

    /// Ingest one document with an explicit chunk configuration.
    ///
    /// The document is chunked, embedded as one batch, and upserted as one
    /// batch: any failure fails the document as a whole and leaves no
    /// partial batch behind. Re-ingesting an unchanged document reproduces
    /// the same chunk ids and overwrites in place. A document that yields
    /// zero chunks is a no-op reported as `Ok(0)`.
    pub async fn ingest_with(
        &self,
        index_name: &str,
        document: &Document,
        chunk_config: &ChunkConfig,
    ) -> Result<usize> {
        chunk_config.validate()?;
        let chunks = chunk(document, chunk_config);
        if chunks.is_empty() {
            info!(
                document.id = %document.id,
                index = index_name,
                chunk_count = 0,
                "document yielded no chunks, nothing to ingest"
            );
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self
            .bounded(self.embedder.embed_batch(&texts), || {
                provider_timeout("embed_batch", self.config.request_timeout)
            })
            .await
            .map_err(|e| {
                error!(
                    document.id = %document.id,
                    index = index_name,
                    error = %e,
                    "embedding failed during ingestion"
                );
                e
            })?;

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("seq".to_string(), chunk.seq.to_string());
                IndexEntry {
                    id: chunk.id.clone(),
                    vector,
                    text: chunk.text.clone(),
                    document_id: chunk.document_id.clone(),
                    metadata,
                }
            })
            .collect();

        let dimension = self.embedder.dimensions();
        self.bounded(self.index.create_index(index_name, dimension), || {
            store_timeout("create_index", index_name, self.config.request_timeout)
        })
        .await
        .map_err(|e| {
            error!(index = index_name, error = %e, "index creation failed during ingestion");
            e
        })?;

        self.bounded(self.index.upsert(index_name, &entries), || {
            store_timeout("upsert", index_name, self.config.request_timeout)
        })
        .await
        .map_err(|e| {
            error!(
                document.id = %document.id,
                index = index_name,
                error = %e,
                "upsert failed during ingestion"
            );
            e
        })?;

        let count = entries.len();
        info!(
            document.id = %document.id,
            index = index_name,
            model = %self.config.embedding_model,
            chunk_count = count,
            "ingested document"
        );
        Ok(count)
    }

    /// Retrieve the most relevant passages for a query, returning the
    /// configured default number of results.
    pub async fn retrieve(&self, index_name: &str, query: &str) -> Result<Vec<SearchHit>> {
        self.retrieve_top_k(index_name, query, self.config.default_top_k)
            .await
    }

    /// Retrieve up to `top_k` passages ranked best first.
    ///
    /// A blank query or a zero `top_k` is rejected as
    /// [`RetrievalError::Input`] before any remote call. Zero matches is a
    /// success with an empty result, while a nonexistent index fails with
    /// [`RetrievalError::IndexNotFound`].
    pub async fn retrieve_top_k(
        &self,
        index_name: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::Input(
                "query text must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(RetrievalError::Input(
                "top_k must be greater than zero".to_string(),
            ));
        }

        let vector = self
            .bounded(self.embedder.embed(query), || {
                provider_timeout("embed", self.config.request_timeout)
            })
            .await
            .map_err(|e| {
                error!(index = index_name, error = %e, "query embedding failed");
                e
            })?;

        let hits = self
            .bounded(self.index.query(index_name, &vector, top_k), || {
                store_timeout("query", index_name, self.config.request_timeout)
            })
            .await
            .map_err(|e| {
                error!(index = index_name, error = %e, "vector index query failed");
                e
            })?;

        info!(
            index = index_name,
            top_k,
            hit_count = hits.len(),
            "retrieval completed"
        );
        Ok(hits)
    }

    /// Bound a remote call by the configured request timeout.
    async fn bounded<T, F>(&self, call: F, on_timeout: impl FnOnce() -> RetrievalError) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.config.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout()),
        }
    }
}

fn provider_timeout(operation: &str, limit: Duration) -> RetrievalError {
    RetrievalError::Provider {
        provider: "embedder".to_string(),
        kind: ProviderErrorKind::Timeout,
        message: format!("{operation} did not complete within {limit:?}"),
    }
}

fn store_timeout(operation: &str, index: &str, limit: Duration) -> RetrievalError {
    RetrievalError::Store {
        backend: "vector-index".to_string(),
        message: format!("{operation} on index '{index}' did not complete within {limit:?}"),
    }
}

/// Builder for [`RetrievalService`].
#[derive(Default)]
pub struct RetrievalServiceBuilder {
    config: Option<RetrievalConfig>,
    embedder: Option<Arc<dyn Embedder>>,
    index: Option<Arc<dyn VectorIndex>>,
}

impl RetrievalServiceBuilder {
    /// Set the service configuration.
    pub fn config(mut self, config: RetrievalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding client.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector index.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Build the service.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if any collaborator is missing.
    pub fn build(self) -> Result<RetrievalService> {
        let config = self
            .config
            .ok_or_else(|| RetrievalError::Config("config is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| RetrievalError::Config("embedder is required".to_string()))?;
        let index = self
            .index
            .ok_or_else(|| RetrievalError::Config("index is required".to_string()))?;
        Ok(RetrievalService {
            config,
            embedder,
            index,
        })
    }
}
