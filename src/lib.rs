//! # notegraph
//!
//! Local-first ingestion of an Obsidian-style vault into an embedding store.
//!
//! The pure pieces (classification, Markdown structure, chunking, chunk ids,
//! the embedder and store traits) live in `notegraph-core`. This crate adds
//! everything with side effects: configuration, the vault walker, content
//! extractors, HTTP embedders, the SQLite store, and the ingestion run.
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ Vault     │──▶│ Extract / │──▶│ Chunk    │──▶│ Embed    │──▶│ SQLite   │
//! │ walker    │   │ Structure │   │ engine   │   │ provider │   │ store    │
//! └───────────┘   └───────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`connector_fs`] | Vault walker with include/exclude globs |
//! | [`extract`] | Content extractors (text, PDF, OOXML, SVG, OCR, speech) |
//! | [`embedding`] | OpenAI and Ollama embedders |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `ChunkStore` |
//! | [`ingest`] | Ingestion orchestrator |
//! | [`progress`] | Progress reporting on stderr |
//! | [`get`] | Chunk lookup by id |
//! | [`search`] | Vector search |
//! | [`stats`] | Store statistics |

pub mod config;
pub mod connector_fs;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod get;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod search;
pub mod sqlite_store;
pub mod stats;
