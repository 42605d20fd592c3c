//! Document chunking.
//!
//! [`chunk`] splits a document into an ordered sequence of bounded-size
//! [`Chunk`]s according to a [`ChunkConfig`]. Splitting is pure and
//! deterministic: identical inputs always produce identical sequences,
//! which keeps chunk ids stable across re-ingestion.
//!
//! Sizes are measured in characters, not bytes. The knowledge bases this
//! crate serves are largely Japanese text, where the two differ by a factor
//! of three and a byte-based split could land inside a character. Every
//! produced chunk is an exact sub-slice of the source text, and together
//! the chunks cover it: concatenating chunk texts minus the overlapped
//! regions reconstructs the document.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, Document};
use crate::error::{Result, RetrievalError};

/// How a document's text is cut into chunk-sized pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Fixed-size sliding windows of at most `max_chars` characters.
    Characters,
    /// Paragraph-aware: split at blank lines, merge adjacent paragraphs
    /// while they fit in `max_chars`, then window any oversize run with the
    /// fixed-size rule.
    Paragraphs,
}

/// Configuration for [`chunk`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum number of characters per chunk.
    pub max_chars: usize,
    /// Number of characters shared between consecutive chunks of an
    /// oversize run. Must be strictly smaller than `max_chars`.
    pub overlap: usize,
    /// The splitting strategy.
    pub strategy: SplitStrategy,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: 512,
            overlap: 50,
            strategy: SplitStrategy::Paragraphs,
        }
    }
}

impl ChunkConfig {
    /// Check that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if `max_chars` is zero or
    /// `overlap` is not strictly smaller than `max_chars`.
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(RetrievalError::Config(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.max_chars {
            return Err(RetrievalError::Config(format!(
                "overlap ({}) must be less than max_chars ({})",
                self.overlap, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Split a document into an ordered sequence of chunks.
///
/// An empty or whitespace-only document yields an empty sequence; no chunk
/// is ever empty. Chunk ids are `"{document_id}_{seq}"` with `seq` counting
/// from zero in document order.
pub fn chunk(document: &Document, config: &ChunkConfig) -> Vec<Chunk> {
    if document.text.trim().is_empty() {
        return Vec::new();
    }

    let text = document.text.as_str();
    let spans = match config.strategy {
        SplitStrategy::Characters => {
            window_spans(text, 0..text.len(), config.max_chars, config.overlap)
        }
        SplitStrategy::Paragraphs => paragraph_spans(text, config.max_chars, config.overlap),
    };

    spans
        .into_iter()
        .enumerate()
        .map(|(seq, span)| Chunk {
            id: format!("{}_{seq}", document.id),
            document_id: document.id.clone(),
            seq,
            text: text[span.clone()].to_string(),
            span,
        })
        .collect()
}

/// Fixed-size windows over `text[range]`, measured in characters, with
/// `overlap` characters shared between consecutive windows.
///
/// Returned spans are byte offsets into the whole of `text` and always lie
/// on character boundaries. `range` itself must lie on character boundaries.
fn window_spans(
    text: &str,
    range: Range<usize>,
    max_chars: usize,
    overlap: usize,
) -> Vec<Range<usize>> {
    let slice = &text[range.clone()];
    if slice.is_empty() {
        return Vec::new();
    }

    // Byte offset of every character in the slice, plus a trailing sentinel
    // so `offsets[char_len]` is the slice length.
    let offsets: Vec<usize> = slice
        .char_indices()
        .map(|(i, _)| i)
        .chain([slice.len()])
        .collect();
    let char_len = offsets.len() - 1;

    let mut spans = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + max_chars).min(char_len);
        spans.push(range.start + offsets[start]..range.start + offsets[end]);
        if end == char_len {
            break;
        }
        let next = end.saturating_sub(overlap);
        if next <= start {
            // No forward progress. Unreachable with a validated
            // configuration, where overlap < max_chars.
            break;
        }
        start = next;
    }
    spans
}

/// Paragraph-aware spans: blank-line segments merged up to `max_chars`,
/// oversize runs windowed with the fixed-size rule.
fn paragraph_spans(text: &str, max_chars: usize, overlap: usize) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    for run in merge_paragraphs(text, max_chars) {
        if text[run.clone()].chars().count() <= max_chars {
            spans.push(run);
        } else {
            spans.extend(window_spans(text, run, max_chars, overlap));
        }
    }
    spans
}

/// Split `text` at blank lines, keeping each separator attached to the
/// segment before it, then greedily merge adjacent segments while the
/// merged run stays within `max_chars` characters.
///
/// A single segment longer than `max_chars` becomes a run of its own; the
/// caller windows it. Runs are contiguous and cover the whole text.
fn merge_paragraphs(text: &str, max_chars: usize) -> Vec<Range<usize>> {
    const SEPARATOR: &str = "\n\n";

    let mut segments: Vec<Range<usize>> = Vec::new();
    let mut start = 0;
    while let Some(pos) = text[start..].find(SEPARATOR) {
        let end = start + pos + SEPARATOR.len();
        segments.push(start..end);
        start = end;
    }
    if start < text.len() {
        segments.push(start..text.len());
    }

    let mut runs: Vec<Range<usize>> = Vec::new();
    let mut current: Option<(Range<usize>, usize)> = None;
    for segment in segments {
        let segment_chars = text[segment.clone()].chars().count();
        current = Some(match current.take() {
            None => (segment, segment_chars),
            Some((run, run_chars)) if run_chars + segment_chars <= max_chars => {
                (run.start..segment.end, run_chars + segment_chars)
            }
            Some((run, _)) => {
                runs.push(run);
                (segment, segment_chars)
            }
        });
    }
    if let Some((run, _)) = current {
        runs.push(run);
    }
    runs
}
