//! Store statistics for `notegraph stats`.
//!
//! Totals, embedding coverage, and a per-content-type breakdown, read
//! through [`ChunkStore::stats`].

use anyhow::Result;
use notegraph_core::store::{ChunkStore, StoreStats};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool);
    let stats = store.stats().await?;
    store.pool().close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    println!("notegraph store");
    println!("===============");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    print!("{}", render(&stats));
    Ok(())
}

fn render(stats: &StoreStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("  Documents:   {}\n", stats.documents));
    out.push_str(&format!("  Chunks:      {}\n", stats.total_chunks));
    out.push_str(&format!(
        "  Embedded:    {} / {} ({}%)\n",
        stats.embedded_chunks,
        stats.total_chunks,
        percent(stats.embedded_chunks, stats.total_chunks)
    ));

    if !stats.by_content_type.is_empty() {
        out.push('\n');
        out.push_str("  By content type:\n");
        out.push_str(&format!("  {:<22} {:>8}\n", "TYPE", "CHUNKS"));
        out.push_str(&format!("  {}\n", "-".repeat(31)));
        for (content_type, n) in &stats.by_content_type {
            out.push_str(&format!("  {:<22} {:>8}\n", content_type, n));
        }
    }
    out
}

fn percent(part: usize, whole: usize) -> usize {
    if whole > 0 {
        part * 100 / whole
    } else {
        0
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
