//! Evidence store adapter - similarity search over indexed guideline chunks

use crate::{AgentError, Embedder, Result};
use async_trait::async_trait;
use guidechat_core::RetrievedChunk;
use guidechat_db::Repository;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Ranked similarity search. Results come back ascending by distance.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Retriever backed by the SurrealDB chunk index
pub struct VectorRetriever {
    repo: Repository,
    embedder: Arc<dyn Embedder>,
}

impl VectorRetriever {
    pub fn new(repo: Repository, embedder: Arc<dyn Embedder>) -> Self {
        Self { repo, embedder }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        debug!("Generating query embedding...");
        let embedding = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| AgentError::upstream("embeddings", e))?;

        let mut results = self
            .repo
            .vector_search(embedding, top_k)
            .await
            .map_err(|e| AgentError::upstream("evidence store", e))?;
        RetrievedChunk::sort_by_distance(&mut results);

        info!(
            "Retrieved {} chunks (best distance {:?})",
            results.len(),
            RetrievedChunk::best_distance(&results)
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidechat_core::GuidelineChunk;
    use guidechat_db::init_memory;

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            Ok(if text.contains("lung") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            })
        }

        async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed_query(text).await?);
            }
            Ok(out)
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AgentError::Processing("connection refused".into()))
        }

        async fn embed_passages(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(AgentError::Processing("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_search_returns_nearest_first() {
        let repo = Repository::new(init_memory().await.unwrap());
        repo.insert_chunks(vec![
            GuidelineChunk::new("ng12_p001_c0000", 1, "breast").with_embedding(vec![0.0, 1.0]),
            GuidelineChunk::new("ng12_p002_c0001", 2, "lung").with_embedding(vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

        let retriever = VectorRetriever::new(repo, Arc::new(AxisEmbedder));
        let results = retriever.search("lung cancer referral", 2).await.unwrap();

        assert_eq!(results[0].chunk_id, "ng12_p002_c0001");
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_upstream_error() {
        let repo = Repository::new(init_memory().await.unwrap());
        let retriever = VectorRetriever::new(repo, Arc::new(DownEmbedder));

        let err = retriever.search("anything", 5).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, AgentError::UpstreamUnavailable { service: "embeddings", .. }));
    }
}
