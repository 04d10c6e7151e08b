//! PDF text via `pdf-extract`, page count via `lopdf`.
//!
//! Both libraries are synchronous and can panic on malformed input, so the
//! work runs on the blocking pool where a panic surfaces as a `JoinError`.

use async_trait::async_trait;
use notegraph_core::models::{ContentType, ExtractionResult, SourceFile};

use super::{signature, ExtractError, Extractor};

pub struct PdfExtractor;

#[async_trait]
impl Extractor for PdfExtractor {
    async fn extract(&self, bytes: &[u8], _file: &SourceFile) -> ExtractionResult {
        if let Err(e) = signature::check(ContentType::Pdf, "pdf", bytes) {
            return e.into_result();
        }
        let owned = bytes.to_vec();
        match tokio::task::spawn_blocking(move || extract_pdf(&owned)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => e.into_result(),
            Err(e) => ExtractError::Pdf(format!("decoder crashed: {}", e)).into_result(),
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<ExtractionResult, ExtractError> {
    let page_count = lopdf::Document::load_mem(bytes)
        .map(|doc| doc.get_pages().len())
        .ok();
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut result = ExtractionResult::from_text(clean_whitespace(&text));
    if let Some(pages) = page_count {
        result = result.with_detail("page_count", pages);
    }
    Ok(result)
}

/// Collapses runs of spaces within lines and of blank lines, and trims.
pub fn clean_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = 0;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_whitespace() {
        let raw = "\n\n  Title   here \n\n\n\nbody\tline\nnext\n  \n";
        assert_eq!(clean_whitespace(raw), "Title here\n\nbody line\nnext");
    }

    fn file() -> SourceFile {
        SourceFile {
            path: "/v/a.pdf".into(),
            relative_path: "a.pdf".to_string(),
            size_bytes: 0,
            created_at: chrono::Utc::now(),
            modified_at: chrono::Utc::now(),
            content_type: ContentType::Pdf,
            mime_type: None,
            checksum: None,
        }
    }

    #[tokio::test]
    async fn test_wrong_signature_is_failed_result() {
        let r = PdfExtractor.extract(b"not a pdf", &file()).await;
        assert!(!r.has_text);
        assert_eq!(r.error.as_deref(), Some("content does not look like a PDF"));
    }

    #[tokio::test]
    async fn test_truncated_pdf_is_failed_result() {
        let r = PdfExtractor.extract(b"%PDF-1.4 but nothing else", &file()).await;
        assert!(!r.has_text);
        assert!(r.error.is_some());
    }
}
