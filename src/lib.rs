//! Retrieval core for anti-pattern knowledge bases.
//!
//! `antipattern-rag` backs a question-answering assistant over small
//! textual knowledge bases, catalogs of software and database
//! anti-patterns among them. It covers the retrieval pipeline only; the
//! agent runtime, the embedding provider, and the vector store engine are
//! external collaborators consumed at their interfaces.
//!
//! The pipeline is composed from four seams:
//!
//! - [`chunking`]: split documents into bounded, deterministic chunks
//! - [`embedding`]: convert text into fixed-dimension vectors
//!   ([`openai`] provides the OpenAI-backed client)
//! - [`index`]: named vector indexes with idempotent creation, batched
//!   upsert, and nearest-neighbor queries ([`inmemory`] for tests and
//!   development, [`pgvector`] for PostgreSQL)
//! - [`service`]: the [`RetrievalService`] that composes ingestion and
//!   retrieval, with [`tool`] as the JSON surface an agent invokes
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use antipattern_rag::{
//!     Document, OpenAIEmbedder, PgVectorIndex, RetrievalConfig, RetrievalService,
//! };
//!
//! # async fn run() -> antipattern_rag::Result<()> {
//! let config = RetrievalConfig::from_env()?;
//! let embedder = OpenAIEmbedder::from_env()?.with_model(&config.embedding_model);
//! let index = PgVectorIndex::from_config(&config).await?;
//!
//! let service = RetrievalService::builder()
//!     .config(config)
//!     .embedder(Arc::new(embedder))
//!     .index(Arc::new(index))
//!     .build()?;
//!
//! let document = Document::new("sql_antipatterns", "..." /* knowledge-base text */);
//! service.ingest("db_design_antipattern_embeddings", &document).await?;
//!
//! let hits = service
//!     .retrieve("db_design_antipattern_embeddings", "命名に関するアンチパターンについて教えて")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod inmemory;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pgvector")]
pub mod pgvector;
pub mod service;
pub mod tool;

pub use chunking::{chunk, ChunkConfig, SplitStrategy};
pub use config::{RetrievalConfig, RetrievalConfigBuilder, STORE_CONNECTION_ENV};
pub use document::{Chunk, Document, IndexEntry, SearchHit};
pub use embedding::Embedder;
pub use error::{ProviderErrorKind, Result, RetrievalError};
pub use index::VectorIndex;
pub use inmemory::InMemoryIndex;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbedder;
#[cfg(feature = "pgvector")]
pub use pgvector::PgVectorIndex;
pub use service::{RetrievalService, RetrievalServiceBuilder};
pub use tool::{KbSearchTool, NO_RESULTS};
