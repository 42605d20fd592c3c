//! Error types for the `antipattern-rag` crate.

use std::fmt;

use thiserror::Error;

/// Classifies an embedding-provider failure so callers can make retry
/// decisions without matching on message text.
///
/// The crate itself never retries: retry policy belongs to the calling
/// layer, where attempt counts and backoff are observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The request never completed (connection refused, DNS, TLS, ...).
    Network,
    /// The request exceeded the configured timeout.
    Timeout,
    /// The provider rejected the request for rate-limiting reasons.
    RateLimited,
    /// The provider rejected the credentials.
    Auth,
    /// The provider returned a non-success status not covered above.
    Api,
    /// The response could not be interpreted: bad JSON, a batch of the
    /// wrong length, or vectors of the wrong dimension.
    MalformedResponse,
}

impl ProviderErrorKind {
    /// Whether retrying the failed call with backoff can reasonably succeed.
    ///
    /// Authentication failures and malformed responses are not retryable:
    /// repeating those calls cannot succeed without a configuration change.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::RateLimited)
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Network => "network failure",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate limited",
            Self::Auth => "authentication failure",
            Self::Api => "api error",
            Self::MalformedResponse => "malformed response",
        };
        f.write_str(label)
    }
}

/// Errors that can occur in retrieval operations.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Missing or inconsistent configuration: a bad connection string, an
    /// invalid chunk configuration, or a dimension mismatch against an
    /// existing index. Fatal; never worth retrying.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An embedding provider call failed.
    #[error("Embedding provider error ({provider}, {kind}): {message}")]
    Provider {
        /// The embedding provider that produced the error.
        provider: String,
        /// The failure class, for retry decisions.
        kind: ProviderErrorKind,
        /// A description of the failure.
        message: String,
    },

    /// The vector store rejected an operation or was unavailable.
    #[error("Vector store error ({backend}): {message}")]
    Store {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The named index does not exist.
    ///
    /// Distinct from querying an existing but empty index, which succeeds
    /// with zero hits.
    #[error("Index not found: {index}")]
    IndexNotFound {
        /// The index name that failed to resolve.
        index: String,
    },

    /// The caller supplied unusable input; no remote call was made.
    #[error("Input error: {0}")]
    Input(String),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;
