//! Repository pattern for database operations

use crate::{DbConnection, DbError, Result};
use guidechat_core::{GuidelineChunk, RetrievedChunk};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Repository for all database operations
#[derive(Clone)]
pub struct Repository {
    db: DbConnection,
}

impl Repository {
    /// Create a new repository
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    // ==========================================
    // CHUNK OPERATIONS
    // ==========================================

    /// Store embedded chunks. Every chunk must carry an embedding.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn insert_chunks(&self, chunks: Vec<GuidelineChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        for chunk in &chunks {
            chunk
                .validate()
                .map_err(|e| DbError::InvalidChunk {
                    chunk_id: chunk.chunk_id.clone(),
                    reason: e.to_string(),
                })?;
            if !chunk.has_embedding() {
                return Err(DbError::InvalidChunk {
                    chunk_id: chunk.chunk_id.clone(),
                    reason: "missing embedding".into(),
                });
            }
        }

        let count = chunks.len();
        self.db
            .query("INSERT INTO chunk $chunks")
            .bind(("chunks", chunks))
            .await?
            .check()
            .map_err(|e| DbError::QueryFailed(format!("insert_chunks: {}", e)))?;

        debug!("Stored {} chunks", count);
        Ok(count)
    }

    /// Remove every stored chunk
    #[instrument(skip(self))]
    pub async fn clear_chunks(&self) -> Result<()> {
        self.db.query("DELETE chunk").await?.check()?;
        Ok(())
    }

    // ==========================================
    // SEARCH OPERATIONS
    // ==========================================

    /// Cosine nearest-neighbour search.
    ///
    /// Returns at most `limit` chunks ordered by ascending cosine distance
    /// (`1 - cosine_similarity`), so 0 means identical.
    #[instrument(skip(self, embedding))]
    pub async fn vector_search(
        &self,
        embedding: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<SearchRow> = self
            .db
            .query(
                r#"
                SELECT
                    chunk_id,
                    page,
                    text,
                    1 - vector::similarity::cosine(embedding, $embedding) AS distance
                FROM chunk
                ORDER BY distance ASC
                LIMIT $limit
            "#,
            )
            .bind(("embedding", embedding))
            .bind(("limit", limit))
            .await?
            .take(0)?;

        let mut results: Vec<RetrievedChunk> = rows
            .into_iter()
            .map(|row| RetrievedChunk {
                chunk_id: row.chunk_id,
                page: row.page,
                text: row.text,
                // Rounding can push identical vectors slightly below zero.
                distance: row.distance.max(0.0),
            })
            .collect();

        RetrievedChunk::sort_by_distance(&mut results);
        results.truncate(limit);

        Ok(results)
    }

    // ==========================================
    // STATS
    // ==========================================

    /// Get index statistics
    #[instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<ChunkStats> {
        let counts: Vec<CountRow> = self
            .db
            .query("SELECT count() AS count FROM chunk GROUP ALL")
            .await?
            .take(0)?;
        let pages: Vec<PageRow> = self
            .db
            .query("SELECT page FROM chunk GROUP BY page")
            .await?
            .take(0)?;

        Ok(ChunkStats {
            chunk_count: counts.first().map(|c| c.count).unwrap_or(0),
            page_count: pages.len() as i64,
        })
    }
}

// ==========================================
// RESULT TYPES
// ==========================================

#[derive(Debug, Deserialize)]
struct SearchRow {
    chunk_id: String,
    page: u32,
    text: String,
    distance: f32,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: i64,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct PageRow {
    page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkStats {
    #[serde(default)]
    pub chunk_count: i64,
    #[serde(default)]
    pub page_count: i64,
}
