//! Embedding service interface and vector utilities.
//!
//! The [`Embedder`] trait is the only thing the ingestion pipeline knows
//! about embedding. Concrete HTTP providers (OpenAI, Ollama) live in the
//! `notegraph` app crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EmbedError;
use crate::models::ContentType;

/// One embedding produced for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f32>,
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    pub model: String,
    /// Provider's confidence in the embedding, `1.0` when it reports none.
    pub confidence: f32,
}

/// Text in, vector out.
///
/// `hint` is the content type of the chunk's source file and `domain` an
/// optional caller-chosen tag; providers may use either to pick a model or
/// prompt, or ignore both.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dims(&self) -> usize;

    async fn embed(
        &self,
        text: &str,
        hint: ContentType,
        domain: Option<&str>,
    ) -> Result<Embedding, EmbedError>;
}

/// Encode a float vector as little-endian f32 bytes.
///
/// ```rust
/// use notegraph_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Reverses [`vec_to_blob`]. Trailing bytes that do not form a full f32
/// are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, zero, or
/// mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
