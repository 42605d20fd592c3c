//! Knowledge-base search tool surface.
//!
//! [`KbSearchTool`] is the fixed-shape JSON boundary an agent layer
//! invokes: `{"query": "..."}` in, `{"contents": ...}` out. It wraps a
//! shared [`RetrievalService`] plus the name of the index it searches by
//! default.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::{Result, RetrievalError};
use crate::service::RetrievalService;

/// Sentinel placed in `contents` when a query matches nothing, so the
/// calling agent sees an explicit outcome rather than an absent field.
pub const NO_RESULTS: &str = "No relevant passages found.";

/// A retrieval tool exposing one knowledge base to an agent.
pub struct KbSearchTool {
    service: Arc<RetrievalService>,
    default_index: String,
}

impl KbSearchTool {
    /// Create a tool backed by the given service. `default_index` is
    /// searched when a call does not name an index.
    pub fn new(service: Arc<RetrievalService>, default_index: impl Into<String>) -> Self {
        Self {
            service,
            default_index: default_index.into(),
        }
    }

    /// Tool identifier presented to the agent layer.
    pub fn name(&self) -> &str {
        "kb_search"
    }

    /// Human-readable description presented to the agent layer.
    pub fn description(&self) -> &str {
        "Search the anti-pattern knowledge base for passages relevant to a query"
    }

    /// JSON schema of the accepted arguments.
    pub fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The question to find relevant passages for"
                },
                "index": {
                    "type": "string",
                    "description": "Knowledge-base index to search; defaults to the tool's index"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum number of passages to return; defaults to the service setting"
                }
            },
            "required": ["query"]
        })
    }

    /// Execute a tool call.
    ///
    /// Malformed arguments are rejected as [`RetrievalError::Input`]
    /// before any remote call. On success the result is
    /// `{"contents": [hit, ...]}` with hits ranked best first; zero
    /// matches yield `{"contents": "No relevant passages found."}`.
    pub async fn execute(&self, args: Value) -> Result<Value> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| RetrievalError::Input("missing required 'query' parameter".to_string()))?;

        let index = match args.get("index") {
            None | Some(Value::Null) => self.default_index.as_str(),
            Some(Value::String(name)) => name.as_str(),
            Some(_) => {
                return Err(RetrievalError::Input("'index' must be a string".to_string()));
            }
        };

        let top_k = match args.get("top_k") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let k = value.as_u64().ok_or_else(|| {
                    RetrievalError::Input("'top_k' must be a positive integer".to_string())
                })?;
                Some(k as usize)
            }
        };

        info!(tool = self.name(), index, "tool call");

        let hits = match top_k {
            Some(k) => self.service.retrieve_top_k(index, query, k).await,
            None => self.service.retrieve(index, query).await,
        }
        .map_err(|e| {
            error!(tool = self.name(), index, error = %e, "tool call failed");
            e
        })?;

        if hits.is_empty() {
            return Ok(json!({ "contents": NO_RESULTS }));
        }

        let contents: Vec<Value> = hits
            .iter()
            .map(|hit| {
                json!({
                    "id": hit.id,
                    "text": hit.text,
                    "document_id": hit.document_id,
                    "metadata": hit.metadata,
                    "score": hit.score,
                })
            })
            .collect();
        Ok(json!({ "contents": contents }))
    }
}
