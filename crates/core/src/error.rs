//! Error types for the core domain

use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid page number: {0} (pages start at 1)")]
    InvalidPage(u32),

    #[error("Invalid distance for chunk {chunk_id}: {distance}")]
    InvalidDistance { chunk_id: String, distance: f32 },

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
