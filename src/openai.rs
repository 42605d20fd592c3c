//! OpenAI embedding client.
//!
//! Only available with the `openai` feature. The default model is
//! `text-embedding-3-small` at 1536 dimensions, the model the anti-pattern
//! knowledge bases are built with.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::Embedder;
use crate::error::{ProviderErrorKind, Result, RetrievalError};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Dimensionality of `text-embedding-3-small` without truncation.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The embeddings endpoint accepts at most this many inputs per request.
/// Larger batches are split into consecutive sub-batches.
const MAX_BATCH_INPUTS: usize = 2048;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An [`Embedder`] backed by the OpenAI embeddings API.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimensions: usize,
    /// Passed to the API when the caller asks for truncated vectors.
    request_dimensions: Option<usize>,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAIEmbedder {
    /// Create a client with the given API key and the default model.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RetrievalError::Config(
                "OpenAI API key must not be empty".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Create a client from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RetrievalError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Self::new(api_key)
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Ask the API for vectors truncated to `dimensions`. Also becomes the
    /// value reported by [`dimensions()`](Embedder::dimensions).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self.request_dimensions = Some(dimensions);
        self
    }

    /// Set the per-request timeout. A request exceeding it fails with a
    /// retryable [`ProviderErrorKind::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn provider_err(kind: ProviderErrorKind, message: impl Into<String>) -> RetrievalError {
        RetrievalError::Provider {
            provider: "openai".to_string(),
            kind,
            message: message.into(),
        }
    }

    fn transport_err(e: reqwest::Error) -> RetrievalError {
        let kind = if e.is_timeout() {
            ProviderErrorKind::Timeout
        } else {
            ProviderErrorKind::Network
        };
        Self::provider_err(kind, format!("request failed: {e}"))
    }

    /// One request against the embeddings endpoint. `texts` must already be
    /// within the API's batch limit.
    async fn embed_request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!(
            provider = "openai",
            model = %self.model,
            batch_size = texts.len(),
            "embedding batch"
        );

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .timeout(self.timeout)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "openai", error = %e, "embedding request failed");
                Self::transport_err(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            let kind = match status.as_u16() {
                401 | 403 => ProviderErrorKind::Auth,
                429 => ProviderErrorKind::RateLimited,
                _ => ProviderErrorKind::Api,
            };
            error!(provider = "openai", status = %status, "embedding API error");
            return Err(Self::provider_err(
                kind,
                format!("API returned {status}: {detail}"),
            ));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "openai", error = %e, "unparseable embedding response");
            Self::provider_err(
                ProviderErrorKind::MalformedResponse,
                format!("failed to parse response: {e}"),
            )
        })?;

        if parsed.data.len() != texts.len() {
            return Err(Self::provider_err(
                ProviderErrorKind::MalformedResponse,
                format!(
                    "expected {} embeddings, API returned {}",
                    texts.len(),
                    parsed.data.len()
                ),
            ));
        }

        // The API tags each embedding with the index of its input; order by
        // it rather than trusting response order.
        let mut data = parsed.data;
        data.sort_by_key(|item| item.index);

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            if item.embedding.len() != self.dimensions {
                return Err(Self::provider_err(
                    ProviderErrorKind::MalformedResponse,
                    format!(
                        "embedding has dimension {}, expected {}",
                        item.embedding.len(),
                        self.dimensions
                    ),
                ));
            }
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_request(&[text]).await?;
        vectors.into_iter().next().ok_or_else(|| {
            Self::provider_err(
                ProviderErrorKind::MalformedResponse,
                "API returned an empty response",
            )
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for sub_batch in texts.chunks(MAX_BATCH_INPUTS) {
            vectors.extend(self.embed_request(sub_batch).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
