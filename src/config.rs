//! Service configuration.
//!
//! Configuration is built once at startup, validated, and injected into
//! the [`RetrievalService`](crate::service::RetrievalService). Nothing in
//! the crate reads the environment at call time, so misconfiguration
//! surfaces before the first request rather than during one.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunking::ChunkConfig;
use crate::error::{Result, RetrievalError};

/// Environment variable [`RetrievalConfig::from_env`] reads the vector
/// store connection string from.
pub const STORE_CONNECTION_ENV: &str = "POSTGRES_CONNECTION_STRING";

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_TOP_K: usize = 3;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a [`RetrievalService`](crate::service::RetrievalService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Connection string of the vector store instance. `None` when only
    /// in-process indexes are used; remote backends require it.
    pub store_connection: Option<String>,
    /// Identifier of the embedding model the indexes were built with.
    /// Recorded in ingestion logs and available to embedder construction.
    pub embedding_model: String,
    /// Number of results a retrieval returns when the caller does not ask
    /// for a specific count.
    pub default_top_k: usize,
    /// Chunking applied during ingestion unless overridden per call.
    pub chunk: ChunkConfig,
    /// Upper bound for each embedding-provider and vector-store call.
    pub request_timeout: Duration,
}

impl RetrievalConfig {
    /// Start building a configuration.
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::default()
    }

    /// Build a configuration from the environment.
    ///
    /// The store connection is read from `POSTGRES_CONNECTION_STRING`;
    /// every other field keeps its default.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if the variable is unset or its
    /// value is not a PostgreSQL URL.
    pub fn from_env() -> Result<Self> {
        let connection = std::env::var(STORE_CONNECTION_ENV).map_err(|_| {
            RetrievalError::Config(format!(
                "{STORE_CONNECTION_ENV} environment variable not set"
            ))
        })?;
        Self::builder().store_connection(connection).build()
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            store_connection: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            default_top_k: DEFAULT_TOP_K,
            chunk: ChunkConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Builder for [`RetrievalConfig`].
#[derive(Debug, Default)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    /// Set the vector store connection string.
    pub fn store_connection(mut self, connection: impl Into<String>) -> Self {
        self.config.store_connection = Some(connection.into());
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the default number of retrieval results.
    pub fn default_top_k(mut self, top_k: usize) -> Self {
        self.config.default_top_k = top_k;
        self
    }

    /// Set the chunk configuration used during ingestion.
    pub fn chunk(mut self, chunk: ChunkConfig) -> Self {
        self.config.chunk = chunk;
        self
    }

    /// Set the per-call timeout for remote operations.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if the store connection is set
    /// but is not a `postgres://` or `postgresql://` URL, if
    /// `default_top_k` is zero, if the request timeout is zero, or if the
    /// chunk configuration is inconsistent.
    pub fn build(self) -> Result<RetrievalConfig> {
        if let Some(connection) = self.config.store_connection.as_deref() {
            validate_store_connection(connection)?;
        }
        if self.config.default_top_k == 0 {
            return Err(RetrievalError::Config(
                "default_top_k must be greater than zero".to_string(),
            ));
        }
        if self.config.request_timeout.is_zero() {
            return Err(RetrievalError::Config(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        self.config.chunk.validate()?;
        Ok(self.config)
    }
}

/// Connection strings are not echoed into errors; they carry credentials.
fn validate_store_connection(connection: &str) -> Result<()> {
    if connection.trim().is_empty() {
        return Err(RetrievalError::Config(
            "store connection string is empty".to_string(),
        ));
    }
    if !connection.starts_with("postgres://") && !connection.starts_with("postgresql://") {
        return Err(RetrievalError::Config(
            "store connection string must be a postgres:// or postgresql:// URL".to_string(),
        ));
    }
    Ok(())
}
