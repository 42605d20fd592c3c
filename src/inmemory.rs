//! In-memory vector index.
//!
//! [`InMemoryIndex`] keeps named indexes in a map behind a
//! `tokio::sync::RwLock` and ranks entries by exact cosine similarity. It
//! enforces the same contracts as the remote backends (declared dimension,
//! id tie-break, index-not-found distinct from empty) and is the index used
//! by tests and development setups.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{IndexEntry, SearchHit};
use crate::error::{Result, RetrievalError};
use crate::index::VectorIndex;

const BACKEND: &str = "in-memory";

/// One named index: its declared dimension plus entries keyed by id.
///
/// A `BTreeMap` keeps entries in id order, which makes full scans and
/// tie-breaks naturally deterministic.
#[derive(Debug, Default)]
struct IndexState {
    dimension: usize,
    entries: BTreeMap<String, IndexEntry>,
}

/// An in-memory [`VectorIndex`] using cosine similarity.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    indexes: RwLock<HashMap<String, IndexState>>,
}

impl InMemoryIndex {
    /// Create an empty index store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine similarity between two equal-length vectors, or 0.0 if either
/// has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn create_index(&self, name: &str, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(RetrievalError::Config(
                "index dimension must be greater than zero".to_string(),
            ));
        }
        let mut indexes = self.indexes.write().await;
        match indexes.get(name) {
            Some(state) if state.dimension != dimension => Err(RetrievalError::Config(format!(
                "index '{name}' already exists with dimension {}, requested {dimension}",
                state.dimension
            ))),
            Some(_) => Ok(()),
            None => {
                indexes.insert(
                    name.to_string(),
                    IndexState {
                        dimension,
                        entries: BTreeMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn upsert(&self, name: &str, entries: &[IndexEntry]) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        let state = indexes
            .get_mut(name)
            .ok_or_else(|| RetrievalError::IndexNotFound {
                index: name.to_string(),
            })?;

        // Validate the whole batch before touching the map, so either every
        // entry lands or none does.
        for entry in entries {
            if entry.vector.len() != state.dimension {
                return Err(RetrievalError::Store {
                    backend: BACKEND.to_string(),
                    message: format!(
                        "entry '{}' has dimension {}, index '{name}' expects {}",
                        entry.id,
                        entry.vector.len(),
                        state.dimension
                    ),
                });
            }
        }
        for entry in entries {
            state.entries.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let indexes = self.indexes.read().await;
        let state = indexes
            .get(name)
            .ok_or_else(|| RetrievalError::IndexNotFound {
                index: name.to_string(),
            })?;
        if vector.len() != state.dimension {
            return Err(RetrievalError::Config(format!(
                "query vector has dimension {}, index '{name}' expects {}",
                vector.len(),
                state.dimension
            )));
        }

        let mut hits: Vec<SearchHit> = state
            .entries
            .values()
            .map(|entry| SearchHit {
                id: entry.id.clone(),
                text: entry.text.clone(),
                document_id: entry.document_id.clone(),
                metadata: entry.metadata.clone(),
                score: cosine_similarity(&entry.vector, vector),
            })
            .collect();

        // Descending score, ascending id on equal scores.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}
