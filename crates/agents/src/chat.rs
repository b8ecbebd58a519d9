//! Chat Agent - answers one question per call, grounded in the guideline
//!
//! Stage order per turn:
//! greeting check -> retrieval -> evidence gate -> history window ->
//! prompt -> generation -> normalize -> grounding -> session append.
//!
//! A turn is recorded only once it has fully succeeded. Upstream failures
//! and timeouts return an error and leave the session untouched.

use crate::grounding::GroundingEnforcer;
use crate::normalizer::normalize;
use crate::{
    AgentError, ChatConfig, EvidenceGate, Generator, GreetingClassifier, PromptAssembler, Result,
    Retriever, SessionStore,
};
use guidechat_core::{AnswerResult, ChatMessage, RetrievedChunk};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct ChatAgent {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    sessions: Arc<dyn SessionStore>,
    config: ChatConfig,
    greetings: GreetingClassifier,
    gate: EvidenceGate,
    prompts: PromptAssembler,
    grounding: GroundingEnforcer,
}

impl ChatAgent {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        sessions: Arc<dyn SessionStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            greetings: GreetingClassifier::new(config.greeting_max_chars, &config.document_name),
            gate: EvidenceGate::new(config.distance_threshold, &config.document_name),
            prompts: PromptAssembler::new(config.document_name.clone(), config.source_label.clone()),
            grounding: GroundingEnforcer::new(&config),
            retriever,
            generator,
            sessions,
            config,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Answer `message` in the context of `session_id`
    pub async fn chat(&self, session_id: &str, message: &str) -> Result<AnswerResult> {
        self.chat_with_top_k(session_id, message, self.config.top_k)
            .await
    }

    #[instrument(skip(self, message), fields(chars = message.len()))]
    pub async fn chat_with_top_k(
        &self,
        session_id: &str,
        message: &str,
        top_k: usize,
    ) -> Result<AnswerResult> {
        if session_id.trim().is_empty() {
            return Err(AgentError::InvalidInput("session id is empty".into()));
        }
        let question = message.trim();
        if question.is_empty() {
            return Err(AgentError::InvalidInput("message is empty".into()));
        }

        if let Some(kind) = self.greetings.classify(question) {
            debug!(?kind, "Greeting, skipping retrieval");
            let result = AnswerResult::answered(self.greetings.response(), Vec::new());
            self.record(session_id, question, &result).await?;
            return Ok(result);
        }

        let mut chunks = self
            .deadline("evidence store", self.retriever.search(question, top_k.max(1)))
            .await?;
        for chunk in &chunks {
            chunk.validate()?;
        }
        RetrievedChunk::sort_by_distance(&mut chunks);

        let outcome = self.gate.evaluate(&chunks);
        if !outcome.passed() {
            info!(
                best_distance = ?outcome.best_distance(),
                threshold = self.gate.threshold(),
                "Evidence too weak, returning disclaimer"
            );
            let result = AnswerResult::disclaimer(self.gate.low_evidence_answer());
            self.record(session_id, question, &result).await?;
            return Ok(result);
        }

        let history = self
            .sessions
            .recent(session_id, self.config.history_window)
            .await?;
        let prompt = self.prompts.assemble(&history, &chunks, question);
        debug!(
            history = history.len(),
            chunks = chunks.len(),
            prompt_chars = prompt.len(),
            "Prompt assembled"
        );

        let raw = self
            .deadline("generation", self.generator.generate(&prompt))
            .await?;

        let normalized = normalize(&raw);
        if !normalized.is_structured() {
            warn!("Model output was not structured, using raw text");
        }

        let result = self.grounding.enforce(normalized, &chunks, &outcome);
        info!(
            citations = result.citations.len(),
            disclaimer = result.is_disclaimer,
            "Answer ready"
        );

        self.record(session_id, question, &result).await?;
        Ok(result)
    }

    /// Full conversation for a session, oldest first
    pub async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        self.sessions.history(session_id).await
    }

    /// Forget a session; returns whether it existed
    pub async fn clear(&self, session_id: &str) -> Result<bool> {
        let existed = self.sessions.clear(session_id).await?;
        debug!(session_id, existed, "Session cleared");
        Ok(existed)
    }

    async fn record(&self, session_id: &str, question: &str, result: &AnswerResult) -> Result<()> {
        self.sessions
            .append_turn(session_id, ChatMessage::user(question), result.to_message())
            .await
    }

    async fn deadline<T, F>(&self, service: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let after: Duration = self.config.upstream_timeout;
        match tokio::time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(service, ?after, "Upstream call timed out");
                Err(AgentError::Timeout { service, after })
            }
        }
    }
}
