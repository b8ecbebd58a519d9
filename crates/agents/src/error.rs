//! Agent error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Database error: {0}")]
    Database(#[from] guidechat_db::DbError),

    #[error("Domain error: {0}")]
    Core(#[from] guidechat_core::CoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable { service: &'static str, reason: String },

    #[error("{service} did not respond within {after:?}")]
    Timeout { service: &'static str, after: Duration },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl AgentError {
    pub fn upstream(service: &'static str, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            service,
            reason: reason.to_string(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::Timeout { .. } | Self::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
