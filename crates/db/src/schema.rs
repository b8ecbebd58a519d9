//! SurrealDB schema definitions

use crate::{DbConnection, DbError, Result};
use tracing::info;

/// Initialize the database schema
pub async fn initialize_schema(db: &DbConnection) -> Result<()> {
    info!("Initializing database schema...");

    db.query(SCHEMA_DEFINITION)
        .await?
        .check()
        .map_err(|e| DbError::SchemaInit(e.to_string()))?;

    info!("Schema initialized successfully");
    Ok(())
}

const SCHEMA_DEFINITION: &str = r#"
-- Guideline passages
DEFINE TABLE IF NOT EXISTS chunk SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS chunk_id ON chunk TYPE string;
DEFINE FIELD IF NOT EXISTS page ON chunk TYPE int;
DEFINE FIELD IF NOT EXISTS text ON chunk TYPE string;
DEFINE FIELD IF NOT EXISTS embedding ON chunk TYPE array<float>;
DEFINE FIELD IF NOT EXISTS created_at ON chunk TYPE datetime DEFAULT time::now();

-- Chunk ids are stable and unique across the document
DEFINE INDEX IF NOT EXISTS idx_chunk_id ON chunk FIELDS chunk_id UNIQUE;
DEFINE INDEX IF NOT EXISTS idx_chunk_page ON chunk FIELDS page;
"#;
