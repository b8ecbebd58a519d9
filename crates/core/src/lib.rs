//! Core domain types for guidechat
//!
//! This crate defines the data structures shared by the grounding pipeline:
//! chat messages, citations, retrieved evidence chunks and answer results.

pub mod answer;
pub mod chunk;
pub mod citation;
pub mod error;
pub mod message;

pub use answer::AnswerResult;
pub use chunk::{GuidelineChunk, RetrievedChunk};
pub use citation::Citation;
pub use error::{CoreError, Result};
pub use message::{ChatMessage, Role};
