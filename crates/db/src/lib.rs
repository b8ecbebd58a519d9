//! Evidence index for guidechat
//!
//! Embedded guideline passages live in a single SurrealDB `chunk` table.
//! The index is opened either on disk (RocksDB, survives restarts so a
//! document is ingested once) or in memory (tests, throwaway sessions).
//! Either way the schema is applied before the handle is returned.

pub mod error;
pub mod repository;
pub mod schema;

pub use error::{DbError, Result};
pub use repository::{ChunkStats, Repository};

use std::path::Path;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;

/// Handle to an opened index
pub type DbConnection = Surreal<Db>;

const NAMESPACE: &str = "guidechat";
const DATABASE: &str = "guidelines";

/// Open (or create) the on-disk index at `path`
pub async fn init_persistent(path: impl AsRef<Path>) -> Result<DbConnection> {
    let db = Surreal::new::<RocksDb>(path.as_ref()).await?;
    prepare(&db).await?;
    Ok(db)
}

/// Open an empty index that lives for the life of the handle
pub async fn init_memory() -> Result<DbConnection> {
    let db = Surreal::new::<Mem>(()).await?;
    prepare(&db).await?;
    Ok(db)
}

async fn prepare(db: &DbConnection) -> Result<()> {
    db.use_ns(NAMESPACE).use_db(DATABASE).await?;
    schema::initialize_schema(db).await
}
