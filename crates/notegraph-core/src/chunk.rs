//! Chunking engine.
//!
//! Turns a parsed note ([`DocumentStructure`]) or an extractor result
//! ([`ExtractionResult`]) into an ordered list of [`Chunk`]s with stable ids
//! and fully populated metadata.
//!
//! Three strategies exist:
//!
//! - **Structure-aware** (notes): one pass over each section's lines. A
//!   section always starts a new chunk; within a section, lines accumulate
//!   until adding the next one would exceed `max_chunk_size` characters, at
//!   which point the chunk is flushed and a new one starts under the same
//!   section label. A single line longer than the limit becomes its own
//!   chunk and is never split.
//! - **Size-window** (extracted text, or notes when structure-awareness is
//!   off): windows of `max_chunk_size` words advancing by
//!   `max_chunk_size - chunk_overlap` words until a window would start past
//!   the last word. Trailing windows may lie inside the previous one.
//! - **Metadata-only**: a short summary of the file (name, type, key
//!   extraction values, error, partial text) used when there is not enough
//!   text to chunk. Every file yields at least one chunk.
//!
//! `chunk_count` in metadata is always the number of chunks actually
//! emitted. The window-count estimate is available separately through
//! [`estimate_window_count`].

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::classify::profile;
use crate::error::ChunkError;
use crate::identity::{chunk_id, source_identifier};
use crate::models::{
    Chunk, ChunkDetails, ChunkMetadata, ChunkStrategy, ContentType, ExtractionResult,
    FileDetails, NoteDetails, SourceFile, SourceType,
};
use crate::structure::DocumentStructure;

/// Characters of extracted text kept in a metadata-only chunk.
const PARTIAL_TEXT_CHARS: usize = 500;
const MAX_CONTEXT_TAGS: usize = 5;
const MAX_CONTEXT_LINKS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkingOptions {
    /// Characters for structure-aware chunks, words for size windows.
    pub max_chunk_size: usize,
    /// Words shared by consecutive size windows.
    pub chunk_overlap: usize,
    pub structure_aware: bool,
    pub inject_context: bool,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 800,
            chunk_overlap: 100,
            structure_aware: true,
            inject_context: false,
        }
    }
}

impl ChunkingOptions {
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.max_chunk_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "max_chunk_size must be > 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.max_chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "chunk_overlap ({}) must be < max_chunk_size ({})",
                self.chunk_overlap, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

/// Document-level metadata inherited by every chunk of one file.
///
/// Built once per file; all defaults are resolved here so the engine never
/// sees a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMeta {
    pub source: String,
    pub document_id: String,
    pub source_type: SourceType,
    pub content_type: ContentType,
    pub file_name: String,
    pub stem: String,
    pub breadcrumb: Vec<String>,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    pub checksum: String,
    pub language: String,
    pub access: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub backlinks: Vec<String>,
}

impl DocumentMeta {
    pub fn new(file: &SourceFile, default_language: &str, access: &str) -> Self {
        Self {
            source: file.source_uri(),
            document_id: source_identifier(file),
            source_type: file.source_type(),
            content_type: file.content_type,
            file_name: file.file_name().to_string(),
            stem: file.stem().to_string(),
            breadcrumb: file.breadcrumb(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.size_bytes,
            checksum: file.checksum.clone().unwrap_or_default(),
            language: default_language.to_string(),
            access: access.to_string(),
            created_at: file.created_at,
            updated_at: file.modified_at,
            backlinks: Vec::new(),
        }
    }

    /// Override the default language when the extractor detected one.
    pub fn with_language(mut self, language: Option<&str>) -> Self {
        if let Some(lang) = language.filter(|l| !l.trim().is_empty()) {
            self.language = lang.to_string();
        }
        self
    }

    pub fn with_backlinks(mut self, backlinks: Vec<String>) -> Self {
        self.backlinks = backlinks;
        self
    }
}

/// A chunk before ids and document metadata are attached.
#[derive(Debug, Clone, PartialEq)]
struct Piece {
    text: String,
    section: String,
    strategy: ChunkStrategy,
    heading_level: u8,
    wikilinks: Vec<String>,
}

pub struct ChunkEngine {
    options: ChunkingOptions,
}

impl ChunkEngine {
    pub fn new(options: ChunkingOptions) -> Result<Self, ChunkError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &ChunkingOptions {
        &self.options
    }

    /// Chunk a parsed Markdown note.
    pub fn chunk_note(&self, doc: &DocumentStructure, meta: &DocumentMeta) -> Vec<Chunk> {
        let title = doc.title(&meta.stem);
        let inject = self.options.structure_aware && self.options.inject_context;

        let mut pieces = if self.options.structure_aware {
            self.structure_pieces(doc, &title, &meta.file_name)
        } else {
            let text = doc
                .sections
                .iter()
                .flat_map(|s| s.lines())
                .collect::<Vec<_>>()
                .join("\n");
            window_chunks(&text, self.options.max_chunk_size, self.options.chunk_overlap)
                .into_iter()
                .map(|text| Piece {
                    text,
                    section: meta.file_name.clone(),
                    strategy: ChunkStrategy::SizeWindow,
                    heading_level: 0,
                    wikilinks: doc.wikilinks.clone(),
                })
                .collect()
        };

        if pieces.is_empty() {
            pieces.push(Piece {
                text: metadata_summary(meta, None),
                section: meta.file_name.clone(),
                strategy: ChunkStrategy::MetadataOnly,
                heading_level: 0,
                wikilinks: Vec::new(),
            });
        } else if inject {
            for piece in &mut pieces {
                let links = if piece.wikilinks.is_empty() {
                    &doc.wikilinks
                } else {
                    &piece.wikilinks
                };
                if let Some(header) = context_line(&title, &meta.stem, &doc.tags, links) {
                    piece.text = format!("{}\n\n{}", header, piece.text);
                }
            }
        }

        finalize(pieces, meta, |piece| {
            ChunkDetails::Note(NoteDetails {
                title: title.clone(),
                file_name: meta.file_name.clone(),
                heading_level: piece.heading_level,
                wikilinks: piece.wikilinks.clone(),
                tags: doc.tags.clone(),
                backlinks: meta.backlinks.clone(),
                frontmatter: doc.frontmatter.clone(),
                checksum: meta.checksum.clone(),
                context_injected: inject && piece.strategy != ChunkStrategy::MetadataOnly,
            })
        })
    }

    /// Chunk the output of a content extractor.
    ///
    /// Text longer than the content type's threshold is window-chunked;
    /// anything else becomes a single metadata-only chunk.
    pub fn chunk_extraction(
        &self,
        extraction: &ExtractionResult,
        meta: &DocumentMeta,
    ) -> Vec<Chunk> {
        let threshold = profile(meta.content_type).min_text_chars;
        let mut pieces: Vec<Piece> = match threshold {
            Some(min) if extraction.has_text && extraction.char_count > min => window_chunks(
                &extraction.text,
                self.options.max_chunk_size,
                self.options.chunk_overlap,
            )
            .into_iter()
            .map(|text| Piece {
                text,
                section: meta.file_name.clone(),
                strategy: ChunkStrategy::SizeWindow,
                heading_level: 0,
                wikilinks: Vec::new(),
            })
            .collect(),
            _ => Vec::new(),
        };
        if pieces.is_empty() {
            pieces.push(Piece {
                text: metadata_summary(meta, Some(extraction)),
                section: meta.file_name.clone(),
                strategy: ChunkStrategy::MetadataOnly,
                heading_level: 0,
                wikilinks: Vec::new(),
            });
        }

        finalize(pieces, meta, |_| {
            ChunkDetails::File(FileDetails {
                file_name: meta.file_name.clone(),
                mime_type: meta.mime_type.clone(),
                size_bytes: meta.size_bytes,
                checksum: meta.checksum.clone(),
                has_text: extraction.has_text,
                word_count: extraction.word_count,
                char_count: extraction.char_count,
                confidence: extraction.confidence,
                error: extraction.error.clone(),
                extraction: extraction.details.clone(),
            })
        })
    }

    fn structure_pieces(&self, doc: &DocumentStructure, title: &str, file_name: &str) -> Vec<Piece> {
        let has_headings = doc.has_headings();
        let mut pieces = Vec::new();
        for section in &doc.sections {
            let label = if !section.is_preamble() {
                section.title.clone()
            } else if has_headings {
                title.to_string()
            } else {
                file_name.to_string()
            };
            for text in split_lines(section.lines(), self.options.max_chunk_size) {
                pieces.push(Piece {
                    text,
                    section: label.clone(),
                    strategy: ChunkStrategy::Structure,
                    heading_level: section.level,
                    wikilinks: section.wikilinks.clone(),
                });
            }
        }
        pieces
    }
}

/// Attach ids and metadata. `pieces` must already be non-empty and free of
/// blank text, so indices are contiguous and `chunk_count` is exact.
fn finalize(
    pieces: Vec<Piece>,
    meta: &DocumentMeta,
    details: impl Fn(&Piece) -> ChunkDetails,
) -> Vec<Chunk> {
    let count = pieces.len();
    let namespace = meta.source_type.namespace();
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| Chunk {
            id: chunk_id(namespace, &meta.document_id, index),
            metadata: ChunkMetadata {
                source: meta.source.clone(),
                section: piece.section.clone(),
                breadcrumb: meta.breadcrumb.clone(),
                content_type: meta.content_type,
                source_type: meta.source_type,
                document_id: meta.document_id.clone(),
                language: meta.language.clone(),
                access: meta.access.clone(),
                created_at: meta.created_at,
                updated_at: meta.updated_at,
                chunk_index: index,
                chunk_count: count,
                strategy: piece.strategy,
                details: details(&piece),
            },
            text: piece.text,
        })
        .collect()
}

/// Accumulate lines into chunks of at most `max_chars` characters.
///
/// A line that alone exceeds the limit is emitted as its own chunk.
/// Whitespace-only chunks are dropped.
pub fn split_lines<'a>(lines: impl IntoIterator<Item = &'a str>, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0;

    for line in lines {
        let line_chars = line.chars().count();
        if !buf.is_empty() && buf_chars + 1 + line_chars > max_chars {
            flush(&mut out, &mut buf);
            buf_chars = 0;
        }
        if !buf.is_empty() {
            buf.push('\n');
            buf_chars += 1;
        }
        buf.push_str(line);
        buf_chars += line_chars;
    }
    flush(&mut out, &mut buf);
    out
}

fn flush(out: &mut Vec<String>, buf: &mut String) {
    let text = buf.trim();
    if !text.is_empty() {
        out.push(text.to_string());
    }
    buf.clear();
}

/// Sliding word windows joined with single spaces.
///
/// One window per start position `0, step, 2 * step, ...` below the word
/// count. Windows that are empty after trimming are dropped.
pub fn window_chunks(text: &str, max_words: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let max_words = max_words.max(1);
    let step = window_step(max_words, overlap);
    let mut out = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + max_words).min(words.len());
        let joined = words[start..end].join(" ");
        if !joined.trim().is_empty() {
            out.push(joined);
        }
        start += step;
    }
    out
}

/// `ceil(total_words / (max_words - overlap))`, the number of window starts
/// [`window_chunks`] visits for `total_words` words.
pub fn estimate_window_count(total_words: usize, max_words: usize, overlap: usize) -> usize {
    total_words.div_ceil(window_step(max_words, overlap))
}

fn window_step(max_words: usize, overlap: usize) -> usize {
    max_words.saturating_sub(overlap).max(1)
}

/// Single-line context header for a note chunk, or `None` if there is
/// nothing worth adding.
pub fn context_line(title: &str, stem: &str, tags: &[String], links: &[String]) -> Option<String> {
    let mut parts = Vec::new();
    if !title.is_empty() && title != stem {
        parts.push(format!("Document: {}", title));
    }
    if !tags.is_empty() {
        let tags: Vec<String> = tags
            .iter()
            .take(MAX_CONTEXT_TAGS)
            .map(|t| format!("#{}", t))
            .collect();
        parts.push(format!("Tags: {}", tags.join(" ")));
    }
    if !links.is_empty() {
        let links: Vec<&str> = links
            .iter()
            .take(MAX_CONTEXT_LINKS)
            .map(String::as_str)
            .collect();
        parts.push(format!("Related: {}", links.join(", ")));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

/// Human-readable summary for a file without chunkable text.
pub fn metadata_summary(meta: &DocumentMeta, extraction: Option<&ExtractionResult>) -> String {
    let mut lines = vec![
        format!("File: {}", meta.file_name),
        format!("Type: {}", profile(meta.content_type).label),
    ];
    if !meta.breadcrumb.is_empty() {
        lines.push(format!("Folder: {}", meta.breadcrumb.join("/")));
    }
    let Some(extraction) = extraction else {
        return lines.join("\n");
    };

    let detail = |key: &str| extraction.details.get(key).filter(|v| !v.is_null());
    if let Some(pages) = detail("page_count") {
        lines.push(format!("Pages: {}", pages));
    }
    if let Some(sheets) = detail("sheet_count") {
        lines.push(format!("Sheets: {}", sheets));
    }
    if let Some(slides) = detail("slide_count") {
        lines.push(format!("Slides: {}", slides));
    }
    if let Some(Value::Number(secs)) = detail("duration_secs") {
        if let Some(secs) = secs.as_f64() {
            lines.push(format!("Duration: {:.1}s", secs));
        }
    }
    lines.push(format!("Words: {}", extraction.word_count));
    if let Some(conf) = extraction.confidence {
        lines.push(format!("Confidence: {:.2}", conf));
    }
    if let Some(err) = &extraction.error {
        lines.push(format!("Error: {}", err));
    }
    let partial = extraction.text.trim();
    if !partial.is_empty() {
        let partial: String = partial.chars().take(PARTIAL_TEXT_CHARS).collect();
        lines.push(format!("Content: {}", partial));
    }
    lines.join("\n")
}
