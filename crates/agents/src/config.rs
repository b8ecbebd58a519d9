//! Pipeline configuration
//!
//! Every tunable constant of the chat pipeline lives here. Defaults match the
//! behaviour the guardrails were designed around; `ChatConfig::from_env`
//! overrides them from the process environment.

use std::time::Duration;

const DEFAULT_GREETING_MAX_CHARS: usize = 60;
const DEFAULT_DISTANCE_THRESHOLD: f32 = 1.2;
const DEFAULT_HISTORY_WINDOW: usize = 20;
const DEFAULT_TOP_K: usize = 5;
const DEFAULT_BACKFILL_LIMIT: usize = 3;
const DEFAULT_EXCERPT_CHARS: usize = 200;
const DEFAULT_MIN_ANSWER_CHARS: usize = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SOURCE_LABEL: &str = "NG12 PDF";
const DEFAULT_DOCUMENT_NAME: &str = "NG12";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Inputs shorter than this (in characters) may match a greeting word
    /// anywhere; longer inputs only match exact greeting phrases.
    pub greeting_max_chars: usize,

    /// Best cosine distance above which retrieval counts as no evidence.
    pub distance_threshold: f32,

    /// Number of most recent messages replayed into the prompt.
    pub history_window: usize,

    /// Chunks requested from the evidence store per question.
    pub top_k: usize,

    /// Maximum citations synthesized when the model omits them.
    pub backfill_limit: usize,

    /// Excerpt length for synthesized citations.
    pub excerpt_chars: usize,

    /// Answers shorter than this (trimmed) never receive back-filled citations.
    pub min_answer_chars: usize,

    /// Deadline for each call to the evidence store and the generator.
    pub upstream_timeout: Duration,

    /// Label written into every citation's `source`.
    pub source_label: String,

    /// Short document name used in prompts and canned answers.
    pub document_name: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting_max_chars: DEFAULT_GREETING_MAX_CHARS,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            history_window: DEFAULT_HISTORY_WINDOW,
            top_k: DEFAULT_TOP_K,
            backfill_limit: DEFAULT_BACKFILL_LIMIT,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            min_answer_chars: DEFAULT_MIN_ANSWER_CHARS,
            upstream_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            source_label: DEFAULT_SOURCE_LABEL.to_string(),
            document_name: DEFAULT_DOCUMENT_NAME.to_string(),
        }
    }
}

impl ChatConfig {
    /// Defaults overridden by `CHAT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `CHAT_*` key.
    /// Unparsable or non-positive values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = positive_usize(lookup("CHAT_TOP_K")) {
            config.top_k = value;
        }
        if let Some(value) = positive_usize(lookup("CHAT_HISTORY_WINDOW")) {
            config.history_window = value;
        }
        if let Some(value) = positive_usize(lookup("CHAT_BACKFILL_LIMIT")) {
            config.backfill_limit = value;
        }
        if let Some(value) = positive_usize(lookup("CHAT_GREETING_MAX_CHARS")) {
            config.greeting_max_chars = value;
        }
        if let Some(value) = positive_usize(lookup("CHAT_EXCERPT_CHARS")) {
            config.excerpt_chars = value;
        }
        if let Some(value) = lookup("CHAT_DISTANCE_THRESHOLD")
            .and_then(|v| v.trim().parse::<f32>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
        {
            config.distance_threshold = value;
        }
        if let Some(secs) = lookup("CHAT_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
        {
            config.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(label) = non_empty(lookup("CHAT_SOURCE_LABEL")) {
            config.source_label = label;
        }
        if let Some(name) = non_empty(lookup("CHAT_DOCUMENT_NAME")) {
            config.document_name = name;
        }

        config
    }

    /// Builder pattern: set retrieval depth
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Builder pattern: set upstream deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }
}

pub(crate) fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|value| {
            let value = value.trim().to_ascii_lowercase();
            matches!(value.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(default)
}

pub(crate) fn env_positive_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn positive_usize(value: Option<String>) -> Option<usize> {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
