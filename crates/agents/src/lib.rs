//! Grounded guideline chat for guidechat
//!
//! This crate contains the answer pipeline and the agents around it:
//! - Greeting classifier, evidence gate, prompt assembler, response
//!   normalizer and grounding enforcer (the guardrail stages)
//! - Session memory: per-session conversation log
//! - ChatAgent: sequences the stages for one chat turn
//! - Librarian: chunks, embeds and indexes a guideline document
//! - Inference clients for embeddings and text generation

pub mod chat;
pub mod config;
pub mod error;
pub mod evidence_gate;
pub mod greeting;
pub mod grounding;
pub mod inference;
pub mod librarian;
pub mod memory;
pub mod normalizer;
pub mod prompt;
pub mod retriever;

pub use chat::ChatAgent;
pub use config::ChatConfig;
pub use error::{AgentError, Result};
pub use evidence_gate::{EvidenceGate, GateOutcome};
pub use greeting::{GreetingClassifier, GreetingMatch};
pub use grounding::GroundingEnforcer;
pub use inference::{Embedder, EmbeddingClient, GenerationClient, Generator};
pub use librarian::{ChunkingConfig, IngestReport, Librarian};
pub use memory::{InMemorySessionStore, SessionStore};
pub use normalizer::{ModelCitation, NormalizedAnswer};
pub use prompt::PromptAssembler;
pub use retriever::{Retriever, VectorRetriever};
