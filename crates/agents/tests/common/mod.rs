//! Common test utilities: recording fakes for the pipeline seams

#![allow(dead_code)]

use async_trait::async_trait;
use guidechat_agents::{
    AgentError, ChatAgent, ChatConfig, Embedder, Generator, InMemorySessionStore, Result,
    Retriever,
};
use guidechat_core::RetrievedChunk;
use guidechat_db::{init_memory, Repository};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Create a test repository with in-memory database
pub async fn create_test_repo() -> Repository {
    let db = init_memory().await.expect("Failed to create test database");
    Repository::new(db)
}

/// Chunks with the given distances, ids `ng12_p{n}_c{i}`
pub fn chunks_at(distances: &[f32]) -> Vec<RetrievedChunk> {
    distances
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let page = i as u32 + 1;
            RetrievedChunk::new(
                format!("ng12_p{:03}_c{:04}", page, i),
                page,
                format!("Guideline passage number {} about referral.", i),
                *d,
            )
        })
        .collect()
}

/// Retriever returning canned chunks and counting calls
pub struct RecordingRetriever {
    chunks: Vec<RetrievedChunk>,
    delay: Option<Duration>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl RecordingRetriever {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            chunks,
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn slow(chunks: Vec<RetrievedChunk>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(chunks)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for RecordingRetriever {
    async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AgentError::upstream("evidence store", "connection refused"));
        }
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }
}

/// Generator returning a canned reply and keeping every prompt it saw
pub struct RecordingGenerator {
    reply: String,
    delay: Option<Duration>,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            delay: None,
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn slow(reply: impl Into<String>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(reply)
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AgentError::upstream("generation", "503 Service Unavailable"));
        }
        Ok(self.reply.clone())
    }
}

/// Bag-of-keywords embedder: one dimension per keyword plus a bias term
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        v.push(0.05);
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }

    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Agent over the given fakes with a fresh session store
pub fn agent_with(
    retriever: Arc<RecordingRetriever>,
    generator: Arc<RecordingGenerator>,
    config: ChatConfig,
) -> ChatAgent {
    ChatAgent::new(
        retriever,
        generator,
        Arc::new(InMemorySessionStore::new()),
        config,
    )
}
