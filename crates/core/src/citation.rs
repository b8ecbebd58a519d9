//! Evidence attribution

use serde::{Deserialize, Serialize};

use crate::RetrievedChunk;

/// A pointer from an answer back to the guideline passage that supports it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    /// Label of the ingested document
    pub source: String,

    /// 1-based page number in the source document
    pub page: u32,

    /// Identifier of the retrieved passage
    pub chunk_id: String,

    /// Short excerpt taken from the passage text
    pub excerpt: String,
}

impl Citation {
    pub fn new(
        source: impl Into<String>,
        page: u32,
        chunk_id: impl Into<String>,
        excerpt: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            page,
            chunk_id: chunk_id.into(),
            excerpt: excerpt.into(),
        }
    }

    /// Build a citation from retrieved evidence, truncating the excerpt to
    /// `max_chars` characters and marking the cut with an ellipsis.
    pub fn from_chunk(source: impl Into<String>, chunk: &RetrievedChunk, max_chars: usize) -> Self {
        Self::new(source, chunk.page, chunk.chunk_id.clone(), excerpt(&chunk.text, max_chars))
    }
}

/// First `max_chars` characters of `text`, with "..." appended when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() > max_chars {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}
