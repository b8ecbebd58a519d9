//! Session memory - per-session conversation log
//!
//! Sessions are created on first append and live for the life of the
//! process. The store is injected into [`crate::ChatAgent`] so tests and
//! other deployments can swap the backing implementation.

use crate::Result;
use async_trait::async_trait;
use guidechat_core::ChatMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append one message, creating the session if needed
    async fn append(&self, session_id: &str, message: ChatMessage) -> Result<()>;

    /// Append a question and its answer as one unit; readers never observe
    /// half a turn.
    async fn append_turn(
        &self,
        session_id: &str,
        question: ChatMessage,
        answer: ChatMessage,
    ) -> Result<()>;

    /// Full history, oldest first; empty for unknown sessions
    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>>;

    /// The most recent `limit` messages, oldest first
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ChatMessage>>;

    /// Drop a session. Returns whether it existed; never fails for an unknown id.
    async fn clear(&self, session_id: &str) -> Result<bool>;
}

/// Process-lifetime store keyed by session id
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Vec<ChatMessage>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append(&self, session_id: &str, message: ChatMessage) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn append_turn(
        &self,
        session_id: &str,
        question: ChatMessage,
        answer: ChatMessage,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let log = sessions.entry(session_id.to_string()).or_default();
        log.push(question);
        log.push(answer);
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .map(|log| window(log, limit).to_vec())
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(session_id).is_some())
    }
}

/// The last `limit` messages of `history`, oldest first.
pub fn window(history: &[ChatMessage], limit: usize) -> &[ChatMessage] {
    let start = history.len().saturating_sub(limit);
    &history[start..]
}
