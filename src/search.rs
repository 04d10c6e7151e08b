//! Vector search for `notegraph search`.
//!
//! Embeds the query with the configured provider and ranks stored chunks by
//! cosine similarity. Requires `[embedding]` to name a provider.

use anyhow::{bail, Result};
use notegraph_core::models::ContentType;
use notegraph_core::store::{ChunkStore, ScoredChunk};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

const SNIPPET_CHARS: usize = 240;

pub async fn search(config: &Config, query: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
    let Some(embedder) = create_embedder(&config.embedding)? else {
        bail!("search requires an embedding provider; set [embedding].provider");
    };
    let query_vec = embedder
        .embed(query, ContentType::PlainText, config.ingest.domain.as_deref())
        .await?;

    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool);
    let results = store.vector_search(&query_vec.vector, limit).await;
    store.pool().close().await;
    Ok(results?)
}

pub async fn run_search(config: &Config, query: &str, limit: usize, json: bool) -> Result<()> {
    let results = search(config, query, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let meta = &result.chunk.metadata;
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            result.score,
            meta.content_type,
            meta.section
        );
        println!("    updated: {}", meta.updated_at.format("%Y-%m-%d"));
        println!("    source: {}", meta.source);
        println!("    excerpt: \"{}\"", snippet(&result.chunk.text));
        println!("    id: {}", result.chunk.id);
        println!();
    }
    Ok(())
}

fn snippet(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat.to_string(),
    }
}
