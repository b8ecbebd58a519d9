//! Guideline passages, as stored and as retrieved

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// A passage of the guideline document prepared for indexing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuidelineChunk {
    /// Stable identifier, e.g. `ng12_p004_c0012`
    pub chunk_id: String,

    /// 1-based page the passage was cut from
    pub page: u32,

    pub text: String,

    /// Vector embedding of `text`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl GuidelineChunk {
    pub fn new(chunk_id: impl Into<String>, page: u32, text: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            page,
            text: text.into(),
            embedding: Vec::new(),
        }
    }

    /// Builder pattern: set embedding
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(CoreError::InvalidPage(self.page));
        }
        if self.chunk_id.trim().is_empty() {
            return Err(CoreError::Validation("chunk_id must not be empty".into()));
        }
        Ok(())
    }
}

/// A passage returned by similarity search.
///
/// `distance` is a cosine distance: 0 is identical, larger is less similar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub page: u32,
    pub text: String,
    pub distance: f32,
}

impl RetrievedChunk {
    pub fn new(chunk_id: impl Into<String>, page: u32, text: impl Into<String>, distance: f32) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            page,
            text: text.into(),
            distance,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(CoreError::InvalidPage(self.page));
        }
        if !self.distance.is_finite() || self.distance < 0.0 {
            return Err(CoreError::InvalidDistance {
                chunk_id: self.chunk_id.clone(),
                distance: self.distance,
            });
        }
        Ok(())
    }

    /// Sort ascending by distance, ties broken by chunk id for stable output.
    pub fn sort_by_distance(chunks: &mut [RetrievedChunk]) {
        chunks.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
    }

    /// Lowest distance in the set, if any.
    pub fn best_distance(chunks: &[RetrievedChunk]) -> Option<f32> {
        chunks.iter().map(|c| c.distance).min_by(|a, b| a.total_cmp(b))
    }
}
