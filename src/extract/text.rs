//! Plain text, Markdown, JSON, XML, and CSV.

use async_trait::async_trait;
use notegraph_core::models::{ExtractionResult, SourceFile};

use super::Extractor;

pub struct TextExtractor;

/// Lossy UTF-8 decode with a leading BOM removed. The flag is true when
/// invalid sequences had to be replaced.
pub fn decode_text(bytes: &[u8]) -> (String, bool) {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), false),
        Err(_) => (String::from_utf8_lossy(bytes).into_owned(), true),
    }
}

#[async_trait]
impl Extractor for TextExtractor {
    async fn extract(&self, bytes: &[u8], _file: &SourceFile) -> ExtractionResult {
        let (text, lossy) = decode_text(bytes);
        ExtractionResult::from_text(text).with_detail("encoding_lossy", lossy)
    }
}
