//! Evidence gate - refuses to generate from weak retrieval
//!
//! Similarity search always returns *something*, so a top-k hit on its own
//! says nothing about relevance. The gate checks the best cosine distance
//! against a fixed threshold before the model is ever called.

use guidechat_core::RetrievedChunk;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateOutcome {
    /// Best distance is within the threshold
    Passed { best_distance: f32 },
    /// Nothing retrieved, or the best hit is too far away
    Failed { best_distance: Option<f32> },
}

impl GateOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, GateOutcome::Passed { .. })
    }

    pub fn best_distance(&self) -> Option<f32> {
        match self {
            GateOutcome::Passed { best_distance } => Some(*best_distance),
            GateOutcome::Failed { best_distance } => *best_distance,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvidenceGate {
    threshold: f32,
    low_evidence_answer: String,
}

impl EvidenceGate {
    pub fn new(threshold: f32, document_name: &str) -> Self {
        Self {
            threshold,
            low_evidence_answer: format!(
                "I couldn't find support in the {doc} text for that question. \
                 The retrieved guideline passages did not contain relevant information. \
                 Please try rephrasing your question or ask about specific cancer types, \
                 symptoms, or referral criteria covered by the {doc} guidelines.",
                doc = document_name
            ),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// A distance equal to the threshold still passes.
    pub fn evaluate(&self, chunks: &[RetrievedChunk]) -> GateOutcome {
        match RetrievedChunk::best_distance(chunks) {
            Some(best) if best <= self.threshold => GateOutcome::Passed {
                best_distance: best,
            },
            best => GateOutcome::Failed {
                best_distance: best,
            },
        }
    }

    /// Fixed answer returned when the gate fails
    pub fn low_evidence_answer(&self) -> &str {
        &self.low_evidence_answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(distances: &[f32]) -> Vec<RetrievedChunk> {
        distances
            .iter()
            .enumerate()
            .map(|(i, d)| RetrievedChunk::new(format!("c{}", i), 1, "text", *d))
            .collect()
    }

    #[test]
    fn test_passes_on_close_match() {
        let gate = EvidenceGate::new(1.2, "NG12");
        let outcome = gate.evaluate(&chunks(&[1.4, 0.35, 0.9]));
        assert_eq!(outcome, GateOutcome::Passed { best_distance: 0.35 });
        assert!(outcome.passed());
    }

    #[test]
    fn test_fails_when_best_exceeds_threshold() {
        let gate = EvidenceGate::new(1.2, "NG12");
        let outcome = gate.evaluate(&chunks(&[1.5, 1.7]));
        assert!(!outcome.passed());
        assert_eq!(outcome.best_distance(), Some(1.5));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let gate = EvidenceGate::new(1.2, "NG12");
        assert!(gate.evaluate(&chunks(&[1.2])).passed());
    }

    #[test]
    fn test_fails_on_empty_retrieval() {
        let gate = EvidenceGate::new(1.2, "NG12");
        assert_eq!(gate.evaluate(&[]), GateOutcome::Failed { best_distance: None });
    }

    #[test]
    fn test_low_evidence_answer_reads_as_disclaimer() {
        let gate = EvidenceGate::new(1.2, "NG12");
        assert!(gate.low_evidence_answer().to_lowercase().contains("couldn't find"));
    }
}
