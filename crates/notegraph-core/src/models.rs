//! Core data models used throughout notegraph.
//!
//! These types describe the files that are ingested, what extractors make
//! of them, and the chunks that flow on to the embedder and the store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of file format families.
///
/// Determines which extractor runs and which chunking strategy applies.
/// Per-type attributes live in [`crate::classify::profile`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Markdown,
    PlainText,
    Pdf,
    OfficeDoc,
    OfficeSheet,
    OfficePresentation,
    RasterImage,
    VectorImage,
    Audio,
    Video,
    Json,
    Xml,
    Csv,
    #[default]
    Unknown,
}

impl ContentType {
    pub const ALL: [ContentType; 14] = [
        ContentType::Markdown,
        ContentType::PlainText,
        ContentType::Pdf,
        ContentType::OfficeDoc,
        ContentType::OfficeSheet,
        ContentType::OfficePresentation,
        ContentType::RasterImage,
        ContentType::VectorImage,
        ContentType::Audio,
        ContentType::Video,
        ContentType::Json,
        ContentType::Xml,
        ContentType::Csv,
        ContentType::Unknown,
    ];

    /// Stable snake_case tag, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Markdown => "markdown",
            ContentType::PlainText => "plain_text",
            ContentType::Pdf => "pdf",
            ContentType::OfficeDoc => "office_doc",
            ContentType::OfficeSheet => "office_sheet",
            ContentType::OfficePresentation => "office_presentation",
            ContentType::RasterImage => "raster_image",
            ContentType::VectorImage => "vector_image",
            ContentType::Audio => "audio",
            ContentType::Video => "video",
            ContentType::Json => "json",
            ContentType::Xml => "xml",
            ContentType::Csv => "csv",
            ContentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::ALL
            .iter()
            .copied()
            .find(|ct| ct.as_str() == s)
            .ok_or_else(|| format!("unknown content type: {}", s))
    }
}

/// Where a chunk came from: a note in the vault, or any other file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "obsidian")]
    Obsidian,
    #[serde(rename = "multi-modal")]
    MultiModal,
}

impl SourceType {
    pub fn for_content_type(content_type: ContentType) -> Self {
        match content_type {
            ContentType::Markdown => SourceType::Obsidian,
            _ => SourceType::MultiModal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Obsidian => "obsidian",
            SourceType::MultiModal => "multi-modal",
        }
    }

    /// Prefix used in chunk ids.
    pub fn namespace(&self) -> &'static str {
        match self {
            SourceType::Obsidian => "obsidian",
            SourceType::MultiModal => "multi",
        }
    }
}

/// A file discovered under the vault root.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the vault root, always `/`-separated.
    pub relative_path: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub content_type: ContentType,
    pub mime_type: Option<String>,
    /// SHA-256 of the raw bytes, hex encoded. Known once the file was read.
    pub checksum: Option<String>,
}

impl SourceFile {
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(pos) if pos > 0 => &name[..pos],
            _ => name,
        }
    }

    /// Folder names from the vault root down to the file's directory.
    pub fn breadcrumb(&self) -> Vec<String> {
        let mut parts: Vec<String> = self
            .relative_path
            .split('/')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        parts.pop();
        parts
    }

    pub fn source_uri(&self) -> String {
        format!("file://{}", self.path.display())
    }

    pub fn source_type(&self) -> SourceType {
        SourceType::for_content_type(self.content_type)
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(self.file_name())
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// Output of a content extractor for one file.
///
/// Built through [`ExtractionResult::from_text`] or
/// [`ExtractionResult::failed`] so that the counters and `has_text` are
/// always derived the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub has_text: bool,
    pub word_count: usize,
    pub char_count: usize,
    pub language: Option<String>,
    pub confidence: Option<f32>,
    /// Format-specific values (page count, duration, ...).
    pub details: Map<String, Value>,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            has_text: word_count > 0,
            char_count: text.chars().count(),
            word_count,
            text,
            language: None,
            confidence: None,
            details: Map::new(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let mut result = Self::from_text(String::new());
        result.error = Some(message.into());
        result
    }

    /// Record a confidence score and clear `has_text` when it is below `min`.
    pub fn with_confidence(mut self, confidence: f32, min: f32) -> Self {
        self.confidence = Some(confidence);
        self.details
            .insert("confidence".to_string(), Value::from(f64::from(confidence)));
        if confidence < min {
            self.has_text = false;
        }
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// How a chunk's text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    Structure,
    SizeWindow,
    MetadataOnly,
}

/// The unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// `file://` URI of the source file.
    pub source: String,
    /// Human-readable section label (heading title or file name).
    pub section: String,
    pub breadcrumb: Vec<String>,
    pub content_type: ContentType,
    pub source_type: SourceType,
    pub document_id: String,
    pub language: String,
    pub access: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub strategy: ChunkStrategy,
    pub details: ChunkDetails,
}

/// Origin-specific metadata bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkDetails {
    Note(NoteDetails),
    File(FileDetails),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteDetails {
    pub title: String,
    pub file_name: String,
    /// Heading level of the chunk's section; 0 for the preamble.
    pub heading_level: u8,
    /// Wikilink targets found in the chunk's section.
    pub wikilinks: Vec<String>,
    /// Document-level tags (frontmatter and inline).
    pub tags: Vec<String>,
    /// Notes that link to this one.
    pub backlinks: Vec<String>,
    pub frontmatter: Map<String, Value>,
    pub checksum: String,
    pub context_injected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileDetails {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    pub checksum: String,
    pub has_text: bool,
    pub word_count: usize,
    pub char_count: usize,
    pub confidence: Option<f32>,
    pub error: Option<String>,
    pub extraction: Map<String, Value>,
}
