//! Chunk storage abstraction.
//!
//! The [`ChunkStore`] trait is everything ingestion and retrieval need from
//! a backend: idempotent upsert by chunk id, lookup by id, brute-force
//! vector search, and summary statistics. The SQLite backend lives in the
//! app crate; [`memory::InMemoryStore`] serves tests and dry runs.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::embedding::Embedding;
use crate::error::StoreError;
use crate::models::Chunk;

/// A chunk returned from vector search.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub score: f32,
    pub chunk: Chunk,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub embedded_chunks: usize,
    pub documents: usize,
    pub by_content_type: BTreeMap<String, usize>,
}

#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert or replace the chunk with `chunk.id`, along with its
    /// embedding if one was computed.
    async fn upsert_chunk(
        &self,
        chunk: &Chunk,
        embedding: Option<&Embedding>,
    ) -> Result<(), StoreError>;

    async fn get_chunk_by_id(&self, id: &str) -> Result<Option<Chunk>, StoreError>;

    async fn chunk_exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.get_chunk_by_id(id).await?.is_some())
    }

    /// Highest cosine similarity first. Chunks without vectors are skipped.
    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
