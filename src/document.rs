//! Core data types: documents, chunks, index entries, and search hits.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A source document: one knowledge-base text plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The full text content of the document.
    pub text: String,
    /// Key-value metadata, inherited by every entry built from this
    /// document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    /// Add a metadata key-value pair.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A bounded slice of a [`Document`]'s text, the unit that is embedded and
/// indexed.
///
/// Chunk identity is deterministic: re-chunking the same document with the
/// same configuration reproduces the same ids, so re-ingestion overwrites
/// entries instead of duplicating them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic identifier, `"{document_id}_{seq}"`.
    pub id: String,
    /// The id of the parent [`Document`].
    pub document_id: String,
    /// Zero-based position of this chunk within its document.
    pub seq: usize,
    /// The chunk text, an exact sub-slice of the document text.
    pub text: String,
    /// Byte range of this chunk in the document text. Both endpoints lie on
    /// UTF-8 character boundaries, so `&document.text[chunk.span.clone()]`
    /// equals `chunk.text`.
    pub span: Range<usize>,
}

/// What a [`VectorIndex`](crate::index::VectorIndex) persists for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Entry identifier, shared with the chunk it was built from.
    pub id: String,
    /// The embedding vector. Its length must match the index dimension.
    pub vector: Vec<f32>,
    /// The chunk text, stored so query results can be rendered without the
    /// source document.
    pub text: String,
    /// The id of the source document.
    pub document_id: String,
    /// Key-value metadata stored alongside the vector.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// One ranked result of a vector-index query.
///
/// Hits carry the stored payload but not the stored vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Identifier of the matching entry.
    pub id: String,
    /// The stored chunk text.
    pub text: String,
    /// The id of the source document.
    pub document_id: String,
    /// Key-value metadata stored with the entry.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Cosine similarity to the query vector; higher is more relevant.
    pub score: f32,
}
