//! Image OCR through the `tesseract` command-line tool.
//!
//! The image is written to the run's scratch directory and recognized with
//! TSV output, which carries a confidence (0-100) per word. The mean word
//! confidence gates `has_text` against `ocr_min_confidence`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notegraph_core::models::{ContentType, ExtractionResult, SourceFile};
use tracing::debug;

use super::{signature, ExtractError, Extractor};
use crate::config::ExtractorsConfig;

pub struct OcrExtractor {
    command: String,
    language: String,
    min_confidence: f32,
    scratch: PathBuf,
    available: bool,
}

impl OcrExtractor {
    pub fn new(config: &ExtractorsConfig, scratch: &Path, available: bool) -> Self {
        Self {
            command: config.ocr_command.clone(),
            language: config.ocr_language.clone(),
            min_confidence: config.ocr_min_confidence,
            scratch: scratch.to_path_buf(),
            available,
        }
    }

    async fn run(&self, bytes: &[u8], file: &SourceFile) -> Result<ExtractionResult, ExtractError> {
        if !self.available {
            return Err(ExtractError::ToolUnavailable(format!("OCR ({})", self.command)));
        }
        let ext = file.extension().unwrap_or_else(|| "img".to_string());
        signature::check(ContentType::RasterImage, &ext, bytes)?;

        let input = self
            .scratch
            .join(format!("{}.{}", uuid::Uuid::new_v4(), ext));
        tokio::fs::write(&input, bytes).await?;
        let output = tokio::process::Command::new(&self.command)
            .arg(&input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("tsv")
            .output()
            .await;
        let _ = tokio::fs::remove_file(&input).await;
        let output = output?;

        if !output.status.success() {
            return Err(ExtractError::Tool {
                tool: self.command.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let ocr = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(file = %file.relative_path, words = ocr.words, confidence = ocr.confidence, "ocr done");
        Ok(ExtractionResult::from_text(ocr.text)
            .with_confidence(ocr.confidence, self.min_confidence)
            .with_detail("ocr_words", ocr.words))
    }
}

#[async_trait]
impl Extractor for OcrExtractor {
    async fn extract(&self, bytes: &[u8], file: &SourceFile) -> ExtractionResult {
        self.run(bytes, file)
            .await
            .unwrap_or_else(ExtractError::into_result)
    }
}

#[derive(Debug, PartialEq)]
pub struct OcrText {
    pub text: String,
    /// Mean word confidence, 0-100. Zero when no words were found.
    pub confidence: f32,
    pub words: usize,
}

/// Rebuilds text from tesseract TSV: words on the same line are joined with
/// spaces, lines with newlines, and blocks/paragraphs with a blank line.
pub fn parse_tsv(tsv: &str) -> OcrText {
    let mut text = String::new();
    let mut last_line: Option<(&str, &str, &str, &str)> = None;
    let mut conf_sum = 0.0f32;
    let mut words = 0usize;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let word = cols[11].trim();
        let conf = cols[10].parse::<f32>().unwrap_or(-1.0);
        if word.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (cols[1], cols[2], cols[3], cols[4]);
        match last_line {
            Some(prev) if prev == key => text.push(' '),
            Some(prev) if (prev.0, prev.1, prev.2) == (key.0, key.1, key.2) => text.push('\n'),
            Some(_) => text.push_str("\n\n"),
            None => {}
        }
        text.push_str(word);
        last_line = Some(key);
        conf_sum += conf;
        words += 1;
    }

    OcrText {
        text,
        confidence: if words > 0 { conf_sum / words as f32 } else { 0.0 },
        words,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn row(block: u32, par: u32, line: u32, word: u32, conf: f32, text: &str) -> String {
        format!("5\t1\t{}\t{}\t{}\t{}\t0\t0\t10\t10\t{}\t{}", block, par, line, word, conf, text)
    }

    #[test]
    fn test_parse_tsv_layout_and_confidence() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t".to_string(),
            row(1, 1, 1, 1, 90.0, "Invoice"),
            row(1, 1, 1, 2, 80.0, "2024"),
            row(1, 1, 2, 1, 70.0, "Total:"),
            row(2, 1, 1, 1, 60.0, "Thanks"),
            row(2, 1, 1, 2, -1.0, ""),
        ]
        .join("\n");
        let ocr = parse_tsv(&tsv);
        assert_eq!(ocr.text, "Invoice 2024\nTotal:\n\nThanks");
        assert_eq!(ocr.words, 4);
        assert!((ocr.confidence - 75.0).abs() < 1e-4);
    }

    #[test]
    fn test_parse_tsv_empty() {
        let ocr = parse_tsv(HEADER);
        assert_eq!(ocr.text, "");
        assert_eq!(ocr.confidence, 0.0);
    }
}
