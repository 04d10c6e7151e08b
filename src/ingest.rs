//! Ingestion orchestration.
//!
//! Drives every discovered file through size check → read → extract (or
//! structure parse for notes) → chunk → embed → store, in fixed-size batches
//! with a pause between batches. Files inside a batch are processed one after
//! another; nothing runs concurrently.
//!
//! Failures are contained at the smallest possible scope:
//!
//! | Scope | Effect |
//! |-------|--------|
//! | chunk | embed/store error recorded with the chunk id, next chunk continues |
//! | file  | read or parse error recorded with the path, file counted as failed |
//! | extraction | error recorded with the path, file counted as failed, its metadata-only chunk still stored |
//! | batch | a panic anywhere in the batch counts all its files as failed |
//!
//! Only setup errors (unreadable vault root, database, extractor scratch dir)
//! abort a run. Each file yields an immutable [`FileOutcome`]; each batch a
//! [`BatchReport`]; the run folds the reports into one [`IngestSummary`].

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::FutureExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, info_span, warn, Instrument};

use notegraph_core::chunk::{estimate_window_count, ChunkEngine, DocumentMeta};
use notegraph_core::embedding::Embedder;
use notegraph_core::identity::source_identifier;
use notegraph_core::models::{Chunk, ChunkStrategy, ContentType, SourceFile};
use notegraph_core::store::memory::InMemoryStore;
use notegraph_core::store::ChunkStore;
use notegraph_core::structure::{LinkIndex, StructureParser};

use crate::config::{Config, IngestConfig};
use crate::connector_fs;
use crate::db;
use crate::embedding::create_embedder;
use crate::extract::text::decode_text;
use crate::extract::{Extractor, ExtractorSet};
use crate::migrate;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};
use crate::sqlite_store::SqliteStore;

/// Per-run knobs, resolved from `[ingest]` plus CLI overrides.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub max_file_bytes: u64,
    pub skip_existing: bool,
    pub access: String,
    pub default_language: String,
    pub backlinks: bool,
    pub domain: Option<String>,
    /// Extract and chunk only; nothing is embedded or stored.
    pub dry_run: bool,
}

impl IngestOptions {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            max_file_bytes: config.max_file_bytes,
            skip_existing: config.skip_existing,
            access: config.access.clone(),
            default_language: config.default_language.clone(),
            backlinks: config.backlinks,
            domain: config.domain.clone(),
            dry_run: false,
        }
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

/// Terminal state of one file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Chunks were produced and sent to the store. A file whose extractor
    /// failed still ends here with `extraction_error` set; it is counted as
    /// failed even though its metadata-only chunk is stored.
    Completed {
        content_type: ContentType,
        chunks: usize,
        stored: usize,
        /// Window-formula prediction, 0 unless the file was window-chunked.
        estimated_chunks: usize,
        /// `"{path}: {error}"` when extraction failed.
        extraction_error: Option<String>,
        /// Per-chunk failures, each prefixed with the chunk id.
        errors: Vec<String>,
    },
    Skipped {
        content_type: ContentType,
        chunks: usize,
        reason: String,
    },
    Failed {
        content_type: ContentType,
        error: String,
    },
}

/// Outcomes of one batch, or the reason the whole batch was lost.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchReport {
    Finished(Vec<FileOutcome>),
    Aborted { files: usize, error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestSummary {
    pub run_id: String,
    pub dry_run: bool,
    pub total_files: usize,
    pub processed_files: usize,
    pub skipped_files: usize,
    pub failed_files: usize,
    pub total_chunks: usize,
    pub processed_chunks: usize,
    /// Sum of the size-window estimate over window-chunked files.
    pub estimated_chunks: usize,
    pub errors: Vec<String>,
    /// Files seen per content type.
    pub by_content_type: BTreeMap<String, usize>,
}

impl IngestSummary {
    fn new(run_id: String, files: &[SourceFile], dry_run: bool) -> Self {
        let mut by_content_type = BTreeMap::new();
        for file in files {
            *by_content_type
                .entry(file.content_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        Self {
            run_id,
            dry_run,
            total_files: files.len(),
            by_content_type,
            ..Default::default()
        }
    }

    /// Fold one batch into the running totals.
    pub fn absorb(mut self, report: BatchReport) -> Self {
        match report {
            BatchReport::Finished(outcomes) => {
                for outcome in outcomes {
                    match outcome {
                        FileOutcome::Completed {
                            chunks,
                            stored,
                            estimated_chunks,
                            extraction_error,
                            errors,
                            ..
                        } => {
                            match extraction_error {
                                Some(error) => {
                                    self.failed_files += 1;
                                    self.errors.push(error);
                                }
                                None => self.processed_files += 1,
                            }
                            self.total_chunks += chunks;
                            self.estimated_chunks += estimated_chunks;
                            self.processed_chunks += stored;
                            self.errors.extend(errors);
                        }
                        FileOutcome::Skipped { chunks, .. } => {
                            self.skipped_files += 1;
                            self.total_chunks += chunks;
                        }
                        FileOutcome::Failed { error, .. } => {
                            self.failed_files += 1;
                            self.errors.push(error);
                        }
                    }
                }
            }
            BatchReport::Aborted { files, error } => {
                self.failed_files += files;
                self.errors.push(error);
            }
        }
        self
    }
}

/// The orchestrator. Borrows its collaborators so tests can pass fakes.
pub struct Ingestor<'a> {
    engine: ChunkEngine,
    parser: StructureParser,
    extractor: &'a dyn Extractor,
    embedder: Option<&'a dyn Embedder>,
    store: &'a dyn ChunkStore,
    progress: &'a dyn IngestProgressReporter,
    options: IngestOptions,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        engine: ChunkEngine,
        extractor: &'a dyn Extractor,
        store: &'a dyn ChunkStore,
        options: IngestOptions,
    ) -> Self {
        Self {
            engine,
            parser: StructureParser::default(),
            extractor,
            embedder: None,
            store,
            progress: &NoProgress,
            options,
        }
    }

    pub fn with_embedder(mut self, embedder: Option<&'a dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn IngestProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Process `files` in discovery order and return the run summary.
    pub async fn run(&self, files: &[SourceFile]) -> IngestSummary {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("ingest", run_id = %run_id);
        self.run_batches(run_id, files).instrument(span).await
    }

    async fn run_batches(&self, run_id: String, files: &[SourceFile]) -> IngestSummary {
        let mut summary = IngestSummary::new(run_id, files, self.options.dry_run);
        info!(files = files.len(), dry_run = self.options.dry_run, "ingest started");

        let links = if self.options.backlinks {
            self.build_link_index(files).await
        } else {
            LinkIndex::new()
        };

        let batches: Vec<&[SourceFile]> = files.chunks(self.options.batch_size).collect();
        let mut done = 0u64;
        for (i, batch) in batches.iter().enumerate() {
            let report = match AssertUnwindSafe(self.process_batch(batch, &links))
                .catch_unwind()
                .await
            {
                Ok(outcomes) => BatchReport::Finished(outcomes),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(batch = i + 1, files = batch.len(), error = %message, "batch aborted");
                    BatchReport::Aborted {
                        files: batch.len(),
                        error: format!("batch {} aborted: {}", i + 1, message),
                    }
                }
            };
            summary = summary.absorb(report);

            done += batch.len() as u64;
            self.progress.report(IngestProgressEvent::Ingesting {
                n: done,
                total: files.len() as u64,
                batch: i as u64 + 1,
            });

            if i + 1 < batches.len() && !self.options.batch_delay.is_zero() {
                tokio::time::sleep(self.options.batch_delay).await;
            }
        }

        info!(
            processed = summary.processed_files,
            skipped = summary.skipped_files,
            failed = summary.failed_files,
            chunks = summary.processed_chunks,
            "ingest finished"
        );
        summary
    }

    /// Parse every note once and index its wikilinks by target stem.
    async fn build_link_index(&self, files: &[SourceFile]) -> LinkIndex {
        let mut index = LinkIndex::new();
        for file in files.iter().filter(|f| f.content_type == ContentType::Markdown) {
            if file.size_bytes > self.options.max_file_bytes {
                continue;
            }
            let bytes = match tokio::fs::read(&file.path).await {
                Ok(b) => b,
                Err(e) => {
                    debug!(file = %file.relative_path, error = %e, "not indexed for backlinks");
                    continue;
                }
            };
            let (text, _) = decode_text(&bytes);
            if let Ok(doc) = self.parser.parse(&text) {
                index.add_document(&source_identifier(file), &doc.wikilinks);
            }
        }
        debug!(targets = index.len(), "link index built");
        index
    }

    async fn process_batch(&self, batch: &[SourceFile], links: &LinkIndex) -> Vec<FileOutcome> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for file in batch {
            outcomes.push(self.process_file(file, links).await);
        }
        outcomes
    }

    async fn process_file(&self, file: &SourceFile, links: &LinkIndex) -> FileOutcome {
        let content_type = file.content_type;
        if file.size_bytes > self.options.max_file_bytes {
            info!(file = %file.relative_path, size = file.size_bytes, "skipping oversize file");
            return FileOutcome::Skipped {
                content_type,
                chunks: 0,
                reason: format!(
                    "{} bytes exceeds limit of {}",
                    file.size_bytes, self.options.max_file_bytes
                ),
            };
        }

        match self.chunk_file(file, links).await {
            Ok(chunked) => self.store_chunks(file, chunked).await,
            Err(e) => {
                warn!(file = %file.relative_path, error = %format!("{:#}", e), "file failed");
                FileOutcome::Failed {
                    content_type,
                    error: format!("{}: {:#}", file.relative_path, e),
                }
            }
        }
    }

    async fn chunk_file(&self, file: &SourceFile, links: &LinkIndex) -> Result<ChunkedFile> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        let file = file
            .clone()
            .with_checksum(hex::encode(Sha256::digest(&bytes)));
        let meta = DocumentMeta::new(
            &file,
            &self.options.default_language,
            &self.options.access,
        );

        if file.content_type == ContentType::Markdown {
            let (text, _) = decode_text(&bytes);
            let doc = self
                .parser
                .parse(&text)
                .context("Failed to parse note structure")?;
            let backlinks = links.backlinks(file.stem(), &meta.document_id);
            let meta = meta.with_backlinks(backlinks);
            let chunks = self.engine.chunk_note(&doc, &meta);
            let estimated_chunks = self.estimate(&file, &chunks, doc.word_count);
            return Ok(ChunkedFile {
                chunks,
                estimated_chunks,
                extraction_error: None,
            });
        }

        let extraction = self.extractor.extract(&bytes, &file).await;
        let extraction_error = extraction.error.as_ref().map(|err| {
            warn!(file = %file.relative_path, error = %err, "extraction failed; metadata-only chunk");
            format!("{}: {}", file.relative_path, err)
        });
        let meta = meta.with_language(extraction.language.as_deref());
        let chunks = self.engine.chunk_extraction(&extraction, &meta);
        let estimated_chunks = self.estimate(&file, &chunks, extraction.word_count);
        Ok(ChunkedFile {
            chunks,
            estimated_chunks,
            extraction_error,
        })
    }

    /// Window-formula estimate for window-chunked files, 0 for the rest.
    fn estimate(&self, file: &SourceFile, chunks: &[Chunk], words: usize) -> usize {
        let windowed = chunks
            .first()
            .is_some_and(|c| c.metadata.strategy == ChunkStrategy::SizeWindow);
        if !windowed {
            return 0;
        }
        let options = self.engine.options();
        let estimate = estimate_window_count(words, options.max_chunk_size, options.chunk_overlap);
        debug!(file = %file.relative_path, chunks = chunks.len(), estimate, "windowed");
        estimate
    }

    /// Embed and upsert each chunk in index order.
    async fn store_chunks(&self, file: &SourceFile, chunked: ChunkedFile) -> FileOutcome {
        let ChunkedFile {
            chunks,
            estimated_chunks,
            extraction_error,
        } = chunked;
        let content_type = file.content_type;
        let total = chunks.len();
        if self.options.dry_run {
            return FileOutcome::Completed {
                content_type,
                chunks: total,
                stored: 0,
                estimated_chunks,
                extraction_error,
                errors: Vec::new(),
            };
        }

        let mut stored = 0;
        let mut skipped = 0;
        let mut errors = Vec::new();
        for chunk in &chunks {
            if self.options.skip_existing {
                match self.store.chunk_exists(&chunk.id).await {
                    Ok(true) => {
                        skipped += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        errors.push(format!("{}: {}", chunk.id, e));
                        continue;
                    }
                }
            }

            let embedding = match self.embedder {
                Some(embedder) => {
                    match embedder
                        .embed(&chunk.text, content_type, self.options.domain.as_deref())
                        .await
                    {
                        Ok(e) => Some(e),
                        Err(e) => {
                            warn!(chunk = %chunk.id, error = %e, "embedding failed");
                            errors.push(format!("{}: {}", chunk.id, e));
                            continue;
                        }
                    }
                }
                None => None,
            };

            match self.store.upsert_chunk(chunk, embedding.as_ref()).await {
                Ok(()) => stored += 1,
                Err(e) => {
                    warn!(chunk = %chunk.id, error = %e, "store failed");
                    errors.push(format!("{}: {}", chunk.id, e));
                }
            }
        }

        debug!(file = %file.relative_path, chunks = total, stored, skipped, "file done");
        if total > 0 && skipped == total && extraction_error.is_none() {
            return FileOutcome::Skipped {
                content_type,
                chunks: total,
                reason: "all chunks already stored".to_string(),
            };
        }
        FileOutcome::Completed {
            content_type,
            chunks: total,
            stored,
            estimated_chunks,
            extraction_error,
            errors,
        }
    }
}

/// Chunks of one file before they reach the embedder and store.
struct ChunkedFile {
    chunks: Vec<Chunk>,
    estimated_chunks: usize,
    extraction_error: Option<String>,
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// CLI-facing flags for one `ingest` invocation.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub dry_run: bool,
    pub skip_existing: bool,
    pub limit: Option<usize>,
}

/// Scan the vault and ingest it into the configured database.
pub async fn run_ingest(
    config: &Config,
    flags: &RunFlags,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestSummary> {
    progress.report(IngestProgressEvent::Discovering {
        root: config.vault.root.display().to_string(),
    });
    let mut files = connector_fs::scan_vault(&config.vault)?;
    if let Some(limit) = flags.limit {
        files.truncate(limit);
    }

    let mut options = IngestOptions::from_config(&config.ingest);
    options.dry_run = flags.dry_run;
    options.skip_existing |= flags.skip_existing;

    let engine = ChunkEngine::new(config.chunking.options())?;
    let extractors = ExtractorSet::init(&config.extractors).await?;

    let summary = if flags.dry_run {
        let store = InMemoryStore::new();
        Ingestor::new(engine, &extractors, &store, options)
            .with_progress(progress)
            .run(&files)
            .await
    } else {
        let embedder = create_embedder(&config.embedding)?;
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        let store = SqliteStore::new(pool);
        let summary = Ingestor::new(engine, &extractors, &store, options)
            .with_embedder(embedder.as_deref())
            .with_progress(progress)
            .run(&files)
            .await;
        store.pool().close().await;
        summary
    };

    extractors.shutdown().await?;
    Ok(summary)
}

/// Human-readable summary for stdout.
pub fn print_summary(summary: &IngestSummary) {
    if summary.dry_run {
        println!("ingest (dry-run)");
    } else {
        println!("ingest {}", summary.run_id);
    }
    println!("  files: {}", summary.total_files);
    for (content_type, n) in &summary.by_content_type {
        println!("    {:<20} {}", content_type, n);
    }
    println!("  processed: {}", summary.processed_files);
    println!("  skipped: {}", summary.skipped_files);
    println!("  failed: {}", summary.failed_files);
    println!("  chunks: {}", summary.total_chunks);
    if summary.dry_run {
        println!(
            "  estimated chunks (size-window files only): {}",
            summary.estimated_chunks
        );
    } else {
        println!("  chunks stored: {}", summary.processed_chunks);
    }
    if !summary.errors.is_empty() {
        println!("  errors:");
        for e in &summary.errors {
            println!("    {}", e);
        }
    }
    println!("ok");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome_completed(chunks: usize, stored: usize, errors: &[&str]) -> FileOutcome {
        FileOutcome::Completed {
            content_type: ContentType::Markdown,
            chunks,
            stored,
            estimated_chunks: chunks,
            extraction_error: None,
            errors: errors.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_summary_folds_batches() {
        let summary = IngestSummary::default()
            .absorb(BatchReport::Finished(vec![
                outcome_completed(3, 2, &["c1: boom"]),
                FileOutcome::Skipped {
                    content_type: ContentType::Pdf,
                    chunks: 0,
                    reason: "too big".to_string(),
                },
            ]))
            .absorb(BatchReport::Aborted {
                files: 4,
                error: "batch 2 aborted: bug".to_string(),
            })
            .absorb(BatchReport::Finished(vec![FileOutcome::Failed {
                content_type: ContentType::Markdown,
                error: "a.md: bad frontmatter".to_string(),
            }]));

        assert_eq!(summary.processed_files, 1);
        assert_eq!(summary.skipped_files, 1);
        assert_eq!(summary.failed_files, 5);
        assert_eq!(summary.total_chunks, 3);
        assert_eq!(summary.processed_chunks, 2);
        assert_eq!(
            summary.errors,
            vec!["c1: boom", "batch 2 aborted: bug", "a.md: bad frontmatter"]
        );
    }

    #[test]
    fn test_extraction_error_counts_file_as_failed() {
        let summary = IngestSummary::default().absorb(BatchReport::Finished(vec![
            FileOutcome::Completed {
                content_type: ContentType::Pdf,
                chunks: 1,
                stored: 1,
                estimated_chunks: 0,
                extraction_error: Some("papers/x.pdf: corrupt xref".to_string()),
                errors: Vec::new(),
            },
            outcome_completed(2, 2, &[]),
        ]));
        assert_eq!(summary.failed_files, 1);
        assert_eq!(summary.processed_files, 1);
        assert_eq!(summary.total_chunks, 3);
        assert_eq!(summary.processed_chunks, 3);
        assert_eq!(summary.errors, vec!["papers/x.pdf: corrupt xref"]);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_options_from_config_clamps_batch_size() {
        let config = IngestConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(IngestOptions::from_config(&config).batch_size, 1);
    }
}
