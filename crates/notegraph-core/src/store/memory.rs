//! In-memory [`ChunkStore`] for tests and dry runs.
//!
//! A `HashMap` behind `std::sync::RwLock`. Vector search is brute-force
//! cosine similarity over every stored vector.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::{cosine_similarity, Embedding};
use crate::error::StoreError;
use crate::models::Chunk;

use super::{ChunkStore, ScoredChunk, StoreStats};

struct StoredChunk {
    chunk: Chunk,
    embedding: Option<Embedding>,
}

#[derive(Default)]
pub struct InMemoryStore {
    chunks: RwLock<HashMap<String, StoredChunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored chunk ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn embedding_for(&self, id: &str) -> Option<Embedding> {
        self.read()
            .ok()
            .and_then(|c| c.get(id).and_then(|s| s.embedding.clone()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoredChunk>>, StoreError> {
        self.chunks
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredChunk>>, StoreError> {
        self.chunks
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn upsert_chunk(
        &self,
        chunk: &Chunk,
        embedding: Option<&Embedding>,
    ) -> Result<(), StoreError> {
        self.write()?.insert(
            chunk.id.clone(),
            StoredChunk {
                chunk: chunk.clone(),
                embedding: embedding.cloned(),
            },
        );
        Ok(())
    }

    async fn get_chunk_by_id(&self, id: &str) -> Result<Option<Chunk>, StoreError> {
        Ok(self.read()?.get(id).map(|s| s.chunk.clone()))
    }

    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let chunks = self.read()?;
        let mut scored: Vec<ScoredChunk> = chunks
            .values()
            .filter_map(|s| {
                s.embedding.as_ref().map(|e| ScoredChunk {
                    score: cosine_similarity(query, &e.vector),
                    chunk: s.chunk.clone(),
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let chunks = self.read()?;
        let mut by_content_type = BTreeMap::new();
        let mut documents = HashSet::new();
        let mut embedded = 0;
        for stored in chunks.values() {
            let meta = &stored.chunk.metadata;
            *by_content_type
                .entry(meta.content_type.as_str().to_string())
                .or_insert(0) += 1;
            documents.insert(meta.document_id.as_str());
            if stored.embedding.is_some() {
                embedded += 1;
            }
        }
        Ok(StoreStats {
            total_chunks: chunks.len(),
            embedded_chunks: embedded,
            documents: documents.len(),
            by_content_type,
        })
    }
}
