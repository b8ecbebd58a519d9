//! Prompt assembly for grounded answers
//!
//! Order: grounding instructions, conversation history (oldest first),
//! retrieved evidence, the current question, then the output contract.

use guidechat_core::{ChatMessage, RetrievedChunk, Role};

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    document_name: String,
    source_label: String,
}

impl PromptAssembler {
    pub fn new(document_name: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            document_name: document_name.into(),
            source_label: source_label.into(),
        }
    }

    /// Sentence the model must use when the evidence does not answer the
    /// question. The grounding enforcer recognises it as a disclaimer.
    pub fn disclaimer_sentence(&self) -> String {
        format!(
            "I couldn't find clear support in the {} guidelines for that question.",
            self.document_name
        )
    }

    /// `history` must already be windowed; it is rendered as given.
    pub fn assemble(
        &self,
        history: &[ChatMessage],
        chunks: &[RetrievedChunk],
        question: &str,
    ) -> String {
        let mut prompt = String::new();

        prompt.push_str(&self.instructions());
        prompt.push_str("\n\n## CONVERSATION HISTORY:\n");
        if history.is_empty() {
            prompt.push_str("(no earlier messages)\n");
        } else {
            for msg in history {
                let speaker = match msg.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                prompt.push_str(&format!("{}: {}\n", speaker, msg.content.trim()));
            }
        }

        prompt.push_str("\n## RETRIEVED CONTEXT:\n");
        prompt.push_str(&format_context(chunks));

        prompt.push_str("\n\n## USER QUESTION:\n");
        prompt.push_str(question.trim());

        prompt.push_str("\n\n");
        prompt.push_str(&self.output_format());
        prompt
    }

    fn instructions(&self) -> String {
        format!(
            "You are the {doc} Clinical Knowledge Assistant. Your sole purpose is to answer \
questions about the {doc} guidelines using ONLY the retrieved guideline passages provided below.

## Strict Rules:
1. ONLY use information from the RETRIEVED CONTEXT. Never use your own knowledge.
2. Cite every clinical statement with the chunk_id, page number and a short excerpt \
(1-2 sentences) from the retrieved passage.
3. Never invent age thresholds, investigation intervals or referral criteria that the \
retrieved text does not state.
4. Never reference documents other than {doc}.
5. Synthesize and summarize; do not copy the passages verbatim.
6. Use the conversation history to understand follow-up questions, but ground every \
answer in the retrieved passages.",
            doc = self.document_name
        )
    }

    fn output_format(&self) -> String {
        format!(
            "## OUTPUT FORMAT:
Respond with ONLY a single JSON object. No markdown, no text before or after it.
{{
  \"answer\": \"<your synthesized answer>\",
  \"citations\": [
    {{\"source\": \"{label}\", \"page\": <page number>, \"chunk_id\": \"<chunk id>\", \"excerpt\": \"<1-2 sentences from the passage>\"}}
  ]
}}
If the retrieved context does not contain enough information, answer exactly:
\"{disclaimer}\" and return an empty citations list.",
            label = self.source_label,
            disclaimer = self.disclaimer_sentence()
        )
    }
}

fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return "No relevant guideline passages were retrieved.".to_string();
    }

    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "[{}] [Chunk {} | Page {} | Distance {:.3}]\n{}",
                i + 1,
                c.chunk_id,
                c.page,
                c.distance,
                c.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
