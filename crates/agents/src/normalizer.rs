//! Response normalizer - turns raw model text into one known shape
//!
//! The generation boundary promises nothing about format. Normalization
//! never fails: it tries a fenced-block parse, then the outermost `{...}`
//! span, and finally falls back to the raw text as the answer.

use serde_json::Value;
use tracing::debug;

/// Answer used when the model returned nothing at all.
pub const EMPTY_RESPONSE_ANSWER: &str =
    "I couldn't find clear support in the guidelines for that question.";

/// Citation as the model wrote it; any field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCitation {
    pub source: Option<String>,
    pub page: Option<u32>,
    pub chunk_id: Option<String>,
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedAnswer {
    /// The model produced a parsable answer object
    Structured {
        answer: String,
        citations: Vec<ModelCitation>,
    },
    /// Nothing parsed; the raw text is the answer
    RawText { answer: String },
}

impl NormalizedAnswer {
    pub fn answer(&self) -> &str {
        match self {
            NormalizedAnswer::Structured { answer, .. } => answer,
            NormalizedAnswer::RawText { answer } => answer,
        }
    }

    pub fn citations(&self) -> &[ModelCitation] {
        match self {
            NormalizedAnswer::Structured { citations, .. } => citations,
            NormalizedAnswer::RawText { .. } => &[],
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, NormalizedAnswer::Structured { .. })
    }
}

pub fn normalize(raw: &str) -> NormalizedAnswer {
    let unfenced = strip_code_fence(raw);
    if let Some(parsed) = parse_answer_object(unfenced) {
        debug!("Model output parsed directly");
        return parsed;
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            if let Some(parsed) = parse_answer_object(&raw[start..=end]) {
                debug!("Model output parsed from embedded object");
                return parsed;
            }
        }
    }

    debug!("Model output is not JSON, using raw text");
    let answer = raw.trim();
    NormalizedAnswer::RawText {
        answer: if answer.is_empty() {
            EMPTY_RESPONSE_ANSWER.to_string()
        } else {
            answer.to_string()
        },
    }
}

/// Inner text of the first fenced code block, or the trimmed input when
/// there is no fence.
fn strip_code_fence(payload: &str) -> &str {
    let trimmed = payload.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    // Skip the fence marker and its language tag (e.g. ```json).
    let after_marker = &trimmed[open + 3..];
    let body = match after_marker.find('\n') {
        Some(newline) => &after_marker[newline + 1..],
        None => after_marker.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

fn parse_answer_object(payload: &str) -> Option<NormalizedAnswer> {
    let value: Value = serde_json::from_str(payload.trim()).ok()?;
    let obj = value.as_object()?;

    // Blank answers keep the structured shape with the fixed sentence.
    let answer = match obj.get("answer")?.as_str()?.trim() {
        "" => EMPTY_RESPONSE_ANSWER.to_string(),
        text => text.to_string(),
    };

    let citations = obj
        .get("citations")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_citation).collect())
        .unwrap_or_default();

    Some(NormalizedAnswer::Structured { answer, citations })
}

fn parse_citation(value: &Value) -> Option<ModelCitation> {
    let obj = value.as_object()?;
    let citation = ModelCitation {
        source: obj.get("source").and_then(value_to_string),
        page: obj.get("page").and_then(value_to_page),
        chunk_id: obj
            .get("chunk_id")
            .or_else(|| obj.get("chunk"))
            .or_else(|| obj.get("id"))
            .and_then(value_to_string),
        excerpt: obj
            .get("excerpt")
            .or_else(|| obj.get("quote"))
            .or_else(|| obj.get("text"))
            .and_then(value_to_string),
    };

    if citation.chunk_id.is_none() && citation.page.is_none() {
        return None;
    }
    Some(citation)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_page(value: &Value) -> Option<u32> {
    let page = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s
            .trim()
            .trim_start_matches(|c: char| !c.is_ascii_digit())
            .parse::<u64>()
            .ok(),
        _ => None,
    }?;
    u32::try_from(page).ok().filter(|p| *p > 0)
}
