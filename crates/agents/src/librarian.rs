//! Librarian Agent - chunks, embeds and indexes a guideline document

use crate::{AgentError, Embedder, Result};
use guidechat_core::GuidelineChunk;
use guidechat_db::Repository;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Page separator in extracted document text
pub const PAGE_BREAK: char = '\x0c';

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_chars: usize,
    /// Characters shared between consecutive windows on a page
    pub overlap_chars: usize,
    /// Passages per embedding request
    pub batch_size: usize,
    /// Chunk id prefix, e.g. `ng12` gives `ng12_p004_c0012`
    pub id_prefix: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 2000,
            overlap_chars: 400,
            batch_size: 20,
            id_prefix: "ng12".to_string(),
        }
    }
}

impl ChunkingConfig {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    fn stride(&self) -> usize {
        self.chunk_chars.saturating_sub(self.overlap_chars).max(1)
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Non-blank pages found in the document
    pub pages: usize,
    /// Chunks written to the index
    pub chunks: usize,
    /// True when the index was already populated and nothing was written
    pub skipped: bool,
    /// Chunk count present before this run
    pub existing: usize,
}

pub struct Librarian {
    repo: Repository,
    embedder: Arc<dyn Embedder>,
    config: ChunkingConfig,
}

impl Librarian {
    pub fn new(repo: Repository, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            repo,
            embedder,
            config: ChunkingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ChunkingConfig) -> Self {
        self.config = config;
        self
    }

    /// Ingest a UTF-8 text file whose pages are separated by form feeds
    #[instrument(skip(self))]
    pub async fn ingest_file(&self, path: &Path, force: bool) -> Result<IngestReport> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            AgentError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.ingest_document(&text, force).await
    }

    /// Ingest document text. An already populated index is left alone
    /// unless `force` is set, in which case it is cleared first.
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn ingest_document(&self, text: &str, force: bool) -> Result<IngestReport> {
        let existing = self.repo.get_stats().await?.chunk_count.max(0) as usize;
        if existing > 0 && !force {
            info!(
                "Index already holds {} chunks, skipping (use force to re-ingest)",
                existing
            );
            return Ok(IngestReport {
                skipped: true,
                existing,
                ..Default::default()
            });
        }
        if existing > 0 {
            info!("Clearing {} existing chunks", existing);
            self.repo.clear_chunks().await?;
        }

        let pages = split_pages(text);
        let chunks = chunk_pages(&pages, &self.config);
        info!("Split {} pages into {} chunks", pages.len(), chunks.len());

        let total_batches = chunks.len().div_ceil(self.config.batch_size.max(1));
        let mut written = 0;
        for (i, batch) in chunks.chunks(self.config.batch_size.max(1)).enumerate() {
            debug!("Embedding batch {}/{}", i + 1, total_batches);
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_passages(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(AgentError::Processing(format!(
                    "embedder returned {} vectors for {} passages",
                    embeddings.len(),
                    batch.len()
                )));
            }

            let embedded: Vec<GuidelineChunk> = batch
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(chunk, embedding)| chunk.with_embedding(embedding))
                .collect();
            written += self.repo.insert_chunks(embedded).await?;
        }

        info!("Stored {} chunks", written);
        Ok(IngestReport {
            pages: pages.len(),
            chunks: written,
            skipped: false,
            existing,
        })
    }
}

/// Non-blank pages as `(page_number, text)`, numbered from 1 by position.
pub fn split_pages(text: &str) -> Vec<(u32, &str)> {
    text.split(PAGE_BREAK)
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| (i as u32 + 1, page))
        .collect()
}

/// Overlapping character windows over each page. The id counter runs across
/// the whole document; blank windows are dropped without consuming an id.
pub fn chunk_pages(pages: &[(u32, &str)], config: &ChunkingConfig) -> Vec<GuidelineChunk> {
    let mut chunks = Vec::new();
    let mut counter = 0usize;

    for (page, text) in pages {
        let chars: Vec<char> = text.chars().collect();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + config.chunk_chars).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let window = window.trim();
            if !window.is_empty() {
                let id = format!("{}_p{:03}_c{:04}", config.id_prefix, page, counter);
                chunks.push(GuidelineChunk::new(id, *page, window));
                counter += 1;
            }
            start += config.stride();
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use guidechat_db::init_memory;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[test]
    fn test_split_pages_numbers_by_position() {
        let pages = split_pages("first\x0c   \x0cthird");
        assert_eq!(pages, vec![(1, "first"), (3, "third")]);
    }

    #[test]
    fn test_chunk_windows_overlap() {
        let config = ChunkingConfig {
            chunk_chars: 10,
            overlap_chars: 4,
            ..Default::default()
        };
        let text = "abcdefghijklmnop";
        let chunks = chunk_pages(&[(2, text)], &config);

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcdefghij", "ghijklmnop", "mnop"]);
        assert_eq!(chunks[0].chunk_id, "ng12_p002_c0000");
        assert_eq!(chunks[2].chunk_id, "ng12_p002_c0002");
    }

    #[test]
    fn test_counter_runs_across_pages() {
        let chunks = chunk_pages(&[(1, "one"), (5, "five")], &ChunkingConfig::default());
        let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["ng12_p001_c0000", "ng12_p005_c0001"]);
    }

    #[tokio::test]
    async fn test_ingest_skips_populated_index() {
        let repo = Repository::new(init_memory().await.unwrap());
        let librarian = Librarian::new(repo.clone(), Arc::new(LengthEmbedder));

        let first = librarian
            .ingest_document("Page one text\x0cPage two text", false)
            .await
            .unwrap();
        assert_eq!(first.pages, 2);
        assert_eq!(first.chunks, 2);

        let second = librarian.ingest_document("Other text", false).await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.existing, 2);

        let forced = librarian.ingest_document("Other text", true).await.unwrap();
        assert_eq!(forced.chunks, 1);
        assert_eq!(repo.get_stats().await.unwrap().chunk_count, 1);
    }
}
