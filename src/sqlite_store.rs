//! SQLite-backed [`ChunkStore`].
//!
//! One row per chunk in the `chunks` table (see [`crate::migrate`]). The full
//! [`ChunkMetadata`] is kept as JSON next to a few indexed columns; the
//! embedding is a little-endian f32 BLOB. Vector search is brute-force cosine
//! similarity over every row that has a vector.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use notegraph_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedding};
use notegraph_core::error::StoreError;
use notegraph_core::models::{Chunk, ChunkMetadata};
use notegraph_core::store::{ChunkStore, ScoredChunk, StoreStats};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk, StoreError> {
    let id: String = row.get("id");
    let metadata_json: String = row.get("metadata_json");
    let metadata: ChunkMetadata =
        serde_json::from_str(&metadata_json).map_err(|e| StoreError::Corrupt {
            id: id.clone(),
            message: e.to_string(),
        })?;
    Ok(Chunk {
        id,
        text: row.get("text"),
        metadata,
    })
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn upsert_chunk(
        &self,
        chunk: &Chunk,
        embedding: Option<&Embedding>,
    ) -> Result<(), StoreError> {
        let meta = &chunk.metadata;
        let metadata_json = serde_json::to_string(meta)?;
        let blob = embedding.map(|e| vec_to_blob(&e.vector));

        sqlx::query(
            r#"
            INSERT INTO chunks (id, document_id, chunk_index, chunk_count, content_type,
                                section, text, metadata_json, embedding, model, confidence,
                                updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                document_id = excluded.document_id,
                chunk_index = excluded.chunk_index,
                chunk_count = excluded.chunk_count,
                content_type = excluded.content_type,
                section = excluded.section,
                text = excluded.text,
                metadata_json = excluded.metadata_json,
                embedding = excluded.embedding,
                model = excluded.model,
                confidence = excluded.confidence,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&chunk.id)
        .bind(&meta.document_id)
        .bind(meta.chunk_index as i64)
        .bind(meta.chunk_count as i64)
        .bind(meta.content_type.as_str())
        .bind(&meta.section)
        .bind(&chunk.text)
        .bind(&metadata_json)
        .bind(blob)
        .bind(embedding.map(|e| e.model.clone()))
        .bind(embedding.map(|e| e.confidence as f64))
        .bind(meta.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn get_chunk_by_id(&self, id: &str) -> Result<Option<Chunk>, StoreError> {
        let row = sqlx::query("SELECT id, text, metadata_json FROM chunks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_chunk).transpose()
    }

    async fn chunk_exists(&self, id: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM chunks WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(exists)
    }

    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, embedding FROM chunks WHERE embedding IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let score = cosine_similarity(query, &blob_to_vec(&blob));
            scored.push(ScoredChunk {
                score,
                chunk: row_to_chunk(row)?,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let totals = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(embedding) AS embedded,
                   COUNT(DISTINCT document_id) AS documents
            FROM chunks
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        let type_rows = sqlx::query(
            "SELECT content_type, COUNT(*) AS n FROM chunks GROUP BY content_type",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let by_content_type: BTreeMap<String, usize> = type_rows
            .iter()
            .map(|row| {
                let n: i64 = row.get("n");
                (row.get::<String, _>("content_type"), n as usize)
            })
            .collect();

        Ok(StoreStats {
            total_chunks: totals.get::<i64, _>("total") as usize,
            embedded_chunks: totals.get::<i64, _>("embedded") as usize,
            documents: totals.get::<i64, _>("documents") as usize,
            by_content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use notegraph_core::models::{
        ChunkDetails, ChunkStrategy, ContentType, NoteDetails, SourceType,
    };
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn chunk(id: &str, doc: &str, content_type: ContentType, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: format!("file:///vault/{}.md", doc),
                section: "Intro".to_string(),
                breadcrumb: vec!["projects".to_string()],
                content_type,
                source_type: SourceType::Obsidian,
                document_id: doc.to_string(),
                language: "en".to_string(),
                access: "private".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                chunk_index: 0,
                chunk_count: 1,
                strategy: ChunkStrategy::Structure,
                details: ChunkDetails::Note(NoteDetails {
                    title: doc.to_string(),
                    tags: vec!["rust".to_string()],
                    ..Default::default()
                }),
            },
        }
    }

    fn emb(vector: Vec<f32>) -> Embedding {
        Embedding {
            vector,
            model: "test-model".to_string(),
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_preserves_metadata() {
        let store = store().await;
        let c = chunk("obsidian_a_0_abcd1234", "a", ContentType::Markdown, "hello");
        store.upsert_chunk(&c, None).await.unwrap();
        let got = store.get_chunk_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(got.text, "hello");
        assert_eq!(got.metadata.breadcrumb, vec!["projects"]);
        match got.metadata.details {
            ChunkDetails::Note(n) => assert_eq!(n.tags, vec!["rust"]),
            other => panic!("unexpected details: {:?}", other),
        }
        assert!(store.get_chunk_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = store().await;
        let mut c = chunk("id1", "a", ContentType::Markdown, "first");
        store.upsert_chunk(&c, None).await.unwrap();
        c.text = "second".to_string();
        store.upsert_chunk(&c, Some(&emb(vec![1.0, 0.0]))).await.unwrap();

        assert!(store.chunk_exists("id1").await.unwrap());
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(stats.embedded_chunks, 1);
        assert_eq!(
            store.get_chunk_by_id("id1").await.unwrap().unwrap().text,
            "second"
        );
    }

    #[tokio::test]
    async fn test_vector_search_and_stats() {
        let store = store().await;
        store
            .upsert_chunk(
                &chunk("near", "a", ContentType::Markdown, "near"),
                Some(&emb(vec![1.0, 0.1])),
            )
            .await
            .unwrap();
        store
            .upsert_chunk(
                &chunk("far", "b", ContentType::Pdf, "far"),
                Some(&emb(vec![-1.0, 0.0])),
            )
            .await
            .unwrap();
        store
            .upsert_chunk(&chunk("plain", "b", ContentType::Pdf, "no vector"), None)
            .await
            .unwrap();

        let hits = store.vector_search(&[1.0, 0.0], 5).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
        assert!(hits[0].score > 0.9);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.embedded_chunks, 2);
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.by_content_type.get("pdf"), Some(&2));
        assert_eq!(stats.by_content_type.get("markdown"), Some(&1));
    }

    #[tokio::test]
    async fn test_corrupt_metadata_reported() {
        let store = store().await;
        sqlx::query(
            "INSERT INTO chunks (id, document_id, chunk_index, chunk_count, content_type, section, text, metadata_json, updated_at)
             VALUES ('bad', 'd', 0, 1, 'pdf', 's', 't', 'not json', 0)",
        )
        .execute(store.pool())
        .await
        .unwrap();
        assert!(matches!(
            store.get_chunk_by_id("bad").await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
