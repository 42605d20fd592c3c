//! Embedding client trait.

use async_trait::async_trait;

use crate::error::Result;

/// A client that converts text into fixed-dimension embedding vectors.
///
/// Implementations put a remote embedding capability behind one async
/// interface so the rest of the crate never touches provider specifics.
/// [`embed_batch`](Embedder::embed_batch) is all-or-nothing: it returns
/// exactly one vector per input, in input order, or fails as a whole. A
/// partial batch could not be mapped back to its source chunks.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving order and length.
    ///
    /// The default implementation embeds texts sequentially and aborts on
    /// the first failure. Providers with native batch endpoints should
    /// override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// The dimension of every vector this client produces.
    ///
    /// Stable for the lifetime of the client. Indexes are created with this
    /// dimension, and query vectors must match it.
    fn dimensions(&self) -> usize;
}
