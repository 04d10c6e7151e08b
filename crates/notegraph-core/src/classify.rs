//! Content-type classification.
//!
//! Classification is a pure function of the file extension. Everything that
//! varies by content type (label, MIME, extractor family, the minimum text
//! length before size-window chunking applies) lives in one [`Profile`]
//! table so that a new type is a single match arm.

use std::path::Path;

use crate::models::ContentType;

/// Which extractor family handles a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorFamily {
    Text,
    Pdf,
    Office,
    Svg,
    Ocr,
    Speech,
    /// No extractor; the file always becomes a metadata-only chunk.
    None,
}

/// Static per-type attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile {
    pub label: &'static str,
    pub mime: &'static str,
    pub family: ExtractorFamily,
    /// Extracted text must be longer than this many characters to be
    /// window-chunked. `None` means always metadata-only.
    pub min_text_chars: Option<usize>,
}

pub fn profile(content_type: ContentType) -> Profile {
    use ExtractorFamily as F;
    let (label, mime, family, min_text_chars) = match content_type {
        ContentType::Markdown => ("Markdown note", "text/markdown", F::Text, Some(0)),
        ContentType::PlainText => ("Plain text", "text/plain", F::Text, Some(0)),
        ContentType::Pdf => ("PDF document", "application/pdf", F::Pdf, Some(0)),
        ContentType::OfficeDoc => (
            "Word document",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            F::Office,
            Some(500),
        ),
        ContentType::OfficeSheet => (
            "Spreadsheet",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            F::Office,
            Some(500),
        ),
        ContentType::OfficePresentation => (
            "Presentation",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            F::Office,
            Some(500),
        ),
        ContentType::RasterImage => ("Image", "image/*", F::Ocr, Some(100)),
        ContentType::VectorImage => ("Vector image", "image/svg+xml", F::Svg, Some(100)),
        ContentType::Audio => ("Audio recording", "audio/*", F::Speech, Some(300)),
        ContentType::Video => ("Video", "video/*", F::None, None),
        ContentType::Json => ("JSON data", "application/json", F::Text, Some(0)),
        ContentType::Xml => ("XML data", "application/xml", F::Text, Some(0)),
        ContentType::Csv => ("CSV data", "text/csv", F::Text, Some(0)),
        ContentType::Unknown => ("Unknown file", "application/octet-stream", F::None, None),
    };
    Profile {
        label,
        mime,
        family,
        min_text_chars,
    }
}

/// Classify a path by its extension (case-insensitive).
pub fn classify(path: impl AsRef<Path>) -> ContentType {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| classify_extension(&e.to_ascii_lowercase()))
        .unwrap_or(ContentType::Unknown)
}

fn classify_extension(ext: &str) -> ContentType {
    match ext {
        "md" | "markdown" | "mdx" => ContentType::Markdown,
        "txt" | "text" | "log" | "rst" | "org" => ContentType::PlainText,
        "pdf" => ContentType::Pdf,
        "docx" | "doc" | "odt" | "rtf" => ContentType::OfficeDoc,
        "xlsx" | "xls" | "ods" => ContentType::OfficeSheet,
        "pptx" | "ppt" | "odp" => ContentType::OfficePresentation,
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tif" | "tiff" => {
            ContentType::RasterImage
        }
        "svg" => ContentType::VectorImage,
        "mp3" | "wav" | "m4a" | "ogg" | "flac" | "aac" | "opus" => ContentType::Audio,
        "mp4" | "mov" | "mkv" | "avi" | "webm" => ContentType::Video,
        "json" | "jsonl" => ContentType::Json,
        "xml" => ContentType::Xml,
        "csv" | "tsv" => ContentType::Csv,
        _ => ContentType::Unknown,
    }
}

/// Best-effort MIME type for a path, more specific than the profile's
/// family-wide value where the extension tells us more.
pub fn mime_for(path: impl AsRef<Path>) -> &'static str {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "doc" => "application/msword",
        "xls" => "application/vnd.ms-excel",
        "ppt" => "application/vnd.ms-powerpoint",
        "tsv" => "text/tab-separated-values",
        _ => profile(classify(path)).mime,
    }
}
