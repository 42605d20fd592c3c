//! Vector index trait.

use async_trait::async_trait;

use crate::document::{IndexEntry, SearchHit};
use crate::error::Result;

/// A named, persistent collection of embedding vectors with payloads,
/// supporting nearest-neighbor queries.
///
/// An index holds vectors of exactly one dimension, fixed when it is
/// created. Implementations enforce that dimension on every write and
/// query, so a model change cannot silently corrupt an existing index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create a named index for vectors of the given dimension.
    ///
    /// Idempotent: creating an index that already exists with the same
    /// dimension is a no-op. An existing index with a different dimension
    /// fails with [`RetrievalError::Config`](crate::error::RetrievalError::Config).
    async fn create_index(&self, name: &str, dimension: usize) -> Result<()>;

    /// Insert entries into an index, replacing any existing entry with the
    /// same id.
    ///
    /// The batch is applied as a unit: on failure no entry from it remains
    /// visible. Entries whose vector length differs from the index
    /// dimension are rejected before anything is written. A nonexistent
    /// index fails with
    /// [`RetrievalError::IndexNotFound`](crate::error::RetrievalError::IndexNotFound).
    async fn upsert(&self, name: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Return up to `top_k` entries ranked by cosine similarity to
    /// `vector`, best first. Equal scores are ordered by ascending id so
    /// results are reproducible.
    ///
    /// An index with fewer than `top_k` entries returns everything it has,
    /// and an empty index returns an empty vec; neither is an error. A
    /// nonexistent index fails with
    /// [`RetrievalError::IndexNotFound`](crate::error::RetrievalError::IndexNotFound).
    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>>;
}
