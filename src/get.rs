//! Chunk retrieval by id for `notegraph get`.

use anyhow::{bail, Result};
use notegraph_core::models::Chunk;
use notegraph_core::store::ChunkStore;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

pub async fn get_chunk(config: &Config, id: &str) -> Result<Chunk> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool);
    let chunk = store.get_chunk_by_id(id).await;
    store.pool().close().await;

    match chunk? {
        Some(chunk) => Ok(chunk),
        None => bail!("chunk not found: {}", id),
    }
}

/// Prints the chunk as pretty JSON.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let chunk = get_chunk(config, id).await?;
    println!("{}", serde_json::to_string_pretty(&chunk)?);
    Ok(())
}
