//! Grounding enforcer - last check before an answer leaves the pipeline
//!
//! Runs the same way for structured and raw-text answers:
//! 1. Disclaimer markers in the answer strip every citation.
//! 2. Model citations survive only if they name a retrieved chunk.
//! 3. An uncited, non-trivial answer backed by passing evidence gets
//!    citations rebuilt from the closest retrieved chunks.
//! 4. Anything else passes through.

use guidechat_core::{AnswerResult, Citation, RetrievedChunk};
use tracing::debug;

use crate::{ChatConfig, GateOutcome, ModelCitation, NormalizedAnswer};

/// Lowercase phrases that mark an answer as "no supporting evidence".
/// `unclear in <document>` is added per document name.
pub const DISCLAIMER_MARKERS: &[&str] = &[
    "couldn't find",
    "could not find",
    "not found",
    "no relevant",
    "no clear support",
    "not contain relevant",
];

#[derive(Debug, Clone)]
pub struct GroundingEnforcer {
    source_label: String,
    backfill_limit: usize,
    excerpt_chars: usize,
    min_answer_chars: usize,
    markers: Vec<String>,
}

impl GroundingEnforcer {
    pub fn new(config: &ChatConfig) -> Self {
        let mut markers: Vec<String> = DISCLAIMER_MARKERS.iter().map(|m| m.to_string()).collect();
        markers.push(format!("unclear in {}", config.document_name.to_lowercase()));

        Self {
            source_label: config.source_label.clone(),
            backfill_limit: config.backfill_limit,
            excerpt_chars: config.excerpt_chars,
            min_answer_chars: config.min_answer_chars,
            markers,
        }
    }

    pub fn enforce(
        &self,
        normalized: NormalizedAnswer,
        chunks: &[RetrievedChunk],
        gate: &GateOutcome,
    ) -> AnswerResult {
        let (answer, model_citations) = match normalized {
            NormalizedAnswer::Structured { answer, citations } => (answer, citations),
            NormalizedAnswer::RawText { answer } => (answer, Vec::new()),
        };

        if self.is_disclaimer(&answer) {
            if !model_citations.is_empty() {
                debug!(
                    dropped = model_citations.len(),
                    "Disclaimer answer, stripping citations"
                );
            }
            return AnswerResult::disclaimer(answer);
        }

        let offered = model_citations.len();
        let mut citations: Vec<Citation> = Vec::with_capacity(offered);
        for citation in model_citations {
            if let Some(resolved) = self.resolve(citation, chunks) {
                if !citations.iter().any(|c| c.chunk_id == resolved.chunk_id) {
                    citations.push(resolved);
                }
            }
        }
        if citations.len() < offered {
            debug!(
                offered,
                kept = citations.len(),
                "Dropped citations not backed by retrieved chunks"
            );
        }

        if citations.is_empty()
            && gate.passed()
            && answer.trim().chars().count() >= self.min_answer_chars
        {
            let backfilled = self.backfill(chunks);
            debug!(count = backfilled.len(), "Back-filled citations from evidence");
            return AnswerResult::answered(answer, backfilled);
        }

        AnswerResult::answered(answer, citations)
    }

    /// Case-insensitive scan for any disclaimer marker
    pub fn is_disclaimer(&self, answer: &str) -> bool {
        let lower = answer.to_lowercase();
        self.markers.iter().any(|marker| lower.contains(marker.as_str()))
    }

    /// Tie a model citation to the retrieved chunk it names. Citations of
    /// passages that were not retrieved are dropped; page and source always
    /// come from the chunk, and the excerpt is kept only if the chunk
    /// actually contains it.
    fn resolve(&self, citation: ModelCitation, chunks: &[RetrievedChunk]) -> Option<Citation> {
        let id = citation.chunk_id.as_deref()?;
        let chunk = chunks.iter().find(|c| c.chunk_id == id)?;

        let quoted = citation
            .excerpt
            .as_deref()
            .map(|e| e.trim().trim_end_matches("...").trim())
            .filter(|e| !e.is_empty() && contains_folded(&chunk.text, e));

        Some(match quoted {
            Some(e) => Citation::new(
                self.source_label.clone(),
                chunk.page,
                chunk.chunk_id.clone(),
                guidechat_core::citation::excerpt(e, self.excerpt_chars),
            ),
            None => Citation::from_chunk(self.source_label.clone(), chunk, self.excerpt_chars),
        })
    }

    fn backfill(&self, chunks: &[RetrievedChunk]) -> Vec<Citation> {
        let mut ranked = chunks.to_vec();
        RetrievedChunk::sort_by_distance(&mut ranked);
        ranked
            .iter()
            .take(self.backfill_limit)
            .map(|chunk| Citation::from_chunk(self.source_label.clone(), chunk, self.excerpt_chars))
            .collect()
    }
}

/// Substring test ignoring case and runs of whitespace (extracted page text
/// wraps lines where the model does not).
fn contains_folded(haystack: &str, needle: &str) -> bool {
    let fold = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    fold(haystack).contains(&fold(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;

    fn enforcer() -> GroundingEnforcer {
        GroundingEnforcer::new(&ChatConfig::default())
    }

    fn evidence() -> Vec<RetrievedChunk> {
        vec![
            RetrievedChunk::new("ng12_p020_c0090", 20, "Consider a non-urgent referral.", 0.9),
            RetrievedChunk::new("ng12_p012_c0040", 12, "Refer people using a suspected cancer pathway.", 0.2),
            RetrievedChunk::new("ng12_p013_c0041", 13, "Offer an urgent chest X-ray.", 0.5),
            RetrievedChunk::new("ng12_p030_c0120", 30, "Measure CA125 in primary care.", 1.1),
        ]
    }

    fn passed() -> GateOutcome {
        GateOutcome::Passed { best_distance: 0.2 }
    }

    #[test]
    fn test_disclaimer_strips_model_citations() {
        let normalized = normalize(
            r#"{"answer":"I couldn't find clear support in the NG12 guidelines for that question.","citations":[{"page":12,"chunk_id":"ng12_p012_c0040"}]}"#,
        );
        let result = enforcer().enforce(normalized, &evidence(), &passed());
        assert!(result.is_disclaimer);
        assert!(result.citations.is_empty());
    }

    #[test]
    fn test_disclaimer_detection_is_case_insensitive() {
        let e = enforcer();
        assert!(e.is_disclaimer("NO RELEVANT passages."));
        assert!(e.is_disclaimer("This is Unclear in NG12."));
        assert!(!e.is_disclaimer("Refer within two weeks."));
    }

    #[test]
    fn test_unclear_marker_follows_document_name() {
        let config = ChatConfig {
            document_name: "CG27".into(),
            ..ChatConfig::default()
        };
        let e = GroundingEnforcer::new(&config);
        assert!(e.is_disclaimer("That is unclear in CG27."));
        assert!(!e.is_disclaimer("That is unclear in NG12."));
    }

    #[test]
    fn test_backfill_uses_closest_three_chunks() {
        let normalized = normalize("```json\n{\"answer\":\"X\",\"citations\":[]}\n```");
        let result = enforcer().enforce(normalized, &evidence(), &passed());

        assert!(!result.is_disclaimer);
        let ids: Vec<&str> = result.citations.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["ng12_p012_c0040", "ng12_p013_c0041", "ng12_p020_c0090"]);
        assert!(result.citations.iter().all(|c| c.source == "NG12 PDF"));
    }

    #[test]
    fn test_backfill_applies_to_raw_text_answers() {
        let normalized = normalize("Refer adults aged 40 and over with unexplained haemoptysis.");
        let chunks = evidence()[..1].to_vec();
        let result = enforcer().enforce(normalized, &chunks, &GateOutcome::Passed { best_distance: 0.9 });
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.citations[0].page, 20);
    }

    #[test]
    fn test_no_backfill_when_gate_failed() {
        let normalized = normalize("Some answer.");
        let result = enforcer().enforce(
            normalized,
            &evidence(),
            &GateOutcome::Failed { best_distance: Some(1.5) },
        );
        assert!(result.citations.is_empty());
        assert!(!result.is_disclaimer);
    }

    #[test]
    fn test_model_citations_pass_through_and_fill_gaps() {
        let normalized = normalize(
            r#"{"answer":"Refer urgently.","citations":[{"chunk_id":"ng12_p013_c0041"}]}"#,
        );
        let result = enforcer().enforce(normalized, &evidence(), &passed());
        assert_eq!(
            result.citations,
            vec![Citation::new("NG12 PDF", 13, "ng12_p013_c0041", "Offer an urgent chest X-ray.")]
        );
    }

    #[test]
    fn test_unretrieved_citation_falls_back_to_backfill() {
        let chunks = evidence()[1..2].to_vec();
        let normalized = normalize(
            r#"{"answer":"Refer urgently.","citations":[{"source":"Other PDF","page":99,"chunk_id":"ng12_p999_c9999","excerpt":"Refer everyone over 18 immediately."}]}"#,
        );
        let result = enforcer().enforce(normalized, &chunks, &passed());

        assert_eq!(
            result.citations,
            vec![Citation::new(
                "NG12 PDF",
                12,
                "ng12_p012_c0040",
                "Refer people using a suspected cancer pathway."
            )]
        );
    }

    #[test]
    fn test_unretrieved_citation_dropped_next_to_valid_one() {
        let normalized = normalize(
            r#"{"answer":"Refer urgently.","citations":[{"chunk_id":"ng12_p999_c9999","page":7},{"chunk_id":"ng12_p013_c0041","page":2}]}"#,
        );
        let result = enforcer().enforce(normalized, &evidence(), &passed());
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.citations[0].chunk_id, "ng12_p013_c0041");
        assert_eq!(result.citations[0].page, 13);
    }

    #[test]
    fn test_invented_excerpt_replaced_with_chunk_text() {
        let normalized = normalize(
            r#"{"answer":"Refer.","citations":[{"chunk_id":"ng12_p012_c0040","excerpt":"Refer everyone over 18 immediately."},{"chunk_id":"ng12_p013_c0041","excerpt":"offer an URGENT chest x-ray"}]}"#,
        );
        let result = enforcer().enforce(normalized, &evidence(), &passed());
        assert_eq!(result.citations[0].excerpt, "Refer people using a suspected cancer pathway.");
        assert_eq!(result.citations[1].excerpt, "offer an URGENT chest x-ray");
    }

    #[test]
    fn test_backfill_excerpt_is_truncated() {
        let long = RetrievedChunk::new("ng12_p001_c0001", 1, "a".repeat(300), 0.1);
        let result = enforcer().enforce(normalize("Answer."), &[long], &passed());
        assert_eq!(result.citations[0].excerpt.chars().count(), 203);
        assert!(result.citations[0].excerpt.ends_with("..."));
    }
}
