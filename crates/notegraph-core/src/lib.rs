//! # notegraph-core
//!
//! I/O-free core of notegraph: content classification, Markdown structure
//! parsing, chunking, chunk identity, and the embedder and store traits the
//! ingestion pipeline is written against.
//!
//! ```text
//! classify ──▶ (extract, app crate) ──▶ chunk ──▶ Embedder ──▶ ChunkStore
//!                    structure ──┘
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Source files, extraction results, chunks |
//! | [`classify`] | Extension → [`ContentType`](models::ContentType) and per-type profiles |
//! | [`structure`] | Frontmatter, sections, wikilinks, tags, backlinks |
//! | [`chunk`] | Structure-aware, size-window, and metadata-only chunking |
//! | [`identity`] | Deterministic chunk ids |
//! | [`embedding`] | [`Embedder`](embedding::Embedder) trait and vector helpers |
//! | [`store`] | [`ChunkStore`](store::ChunkStore) trait and in-memory backend |
//! | [`error`] | Error enums |

pub mod chunk;
pub mod classify;
pub mod embedding;
pub mod error;
pub mod identity;
pub mod models;
pub mod store;
pub mod structure;
