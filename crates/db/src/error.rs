//! Failures raised by the evidence index

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// A chunk was refused before reaching the store
    #[error("Chunk {chunk_id} rejected: {reason}")]
    InvalidChunk { chunk_id: String, reason: String },

    /// The store accepted the request but a statement in it failed
    #[error("Index query failed: {0}")]
    QueryFailed(String),

    #[error("Could not apply index schema: {0}")]
    SchemaInit(String),

    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
