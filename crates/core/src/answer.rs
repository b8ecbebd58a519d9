//! The pipeline's output unit

use serde::{Deserialize, Serialize};

use crate::{ChatMessage, Citation};

/// A finished answer.
///
/// A disclaimer never carries citations; the constructors enforce it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    pub answer: String,

    #[serde(default)]
    pub citations: Vec<Citation>,

    #[serde(default)]
    pub is_disclaimer: bool,
}

impl AnswerResult {
    /// A grounded (or conversational) answer
    pub fn answered(answer: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            answer: answer.into(),
            citations,
            is_disclaimer: false,
        }
    }

    /// A "no supporting evidence" answer; citations are always dropped
    pub fn disclaimer(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            citations: Vec::new(),
            is_disclaimer: true,
        }
    }

    pub fn is_cited(&self) -> bool {
        !self.citations.is_empty()
    }

    /// The assistant turn recorded in session memory for this answer
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::assistant(self.answer.clone(), self.citations.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disclaimer_has_no_citations() {
        let result = AnswerResult::disclaimer("I couldn't find clear support.");
        assert!(result.is_disclaimer);
        assert!(!result.is_cited());
    }

    #[test]
    fn test_to_message_keeps_citations() {
        let citation = Citation::new("NG12 PDF", 3, "ng12_p003_c0007", "Refer urgently.");
        let result = AnswerResult::answered("Refer urgently.", vec![citation.clone()]);
        let msg = result.to_message();
        assert_eq!(msg.content, "Refer urgently.");
        assert_eq!(msg.citations, vec![citation]);
    }
}
