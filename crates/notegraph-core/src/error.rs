//! Error types for notegraph-core.
//!
//! Extraction has no error type here: extractors report failure through
//! [`ExtractionResult::failed`](crate::models::ExtractionResult::failed)
//! and never return an error past their boundary.

use thiserror::Error;

/// Markdown structure parsing errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructureError {
    /// The frontmatter block could not be parsed into a mapping.
    #[error("frontmatter line {line}: {message}")]
    Frontmatter { line: usize, message: String },
}

/// Chunking errors.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("structure error: {0}")]
    Structure(#[from] StructureError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("empty input")]
    EmptyInput,
}

/// Chunk store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record {id}: {message}")]
    Corrupt { id: String, message: String },
}
