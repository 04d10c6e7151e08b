//! Content extractors.
//!
//! Every extractor turns the raw bytes of one file into an
//! [`ExtractionResult`] and never fails past its own boundary: internal
//! errors become [`ExtractionResult::failed`]. [`ExtractorSet`] owns one
//! extractor per family plus the scratch directory that the command-line
//! tools (tesseract, whisper) work in, and dispatches by content type.
//!
//! | Family | Types | Backend |
//! |--------|-------|---------|
//! | text | Markdown, PlainText, Json, Xml, Csv | lossy UTF-8 |
//! | pdf | Pdf | `pdf-extract`, `lopdf` page count |
//! | office | OfficeDoc/Sheet/Presentation | OOXML via `zip` + `quick-xml` |
//! | svg | VectorImage | `quick-xml` |
//! | ocr | RasterImage | `tesseract` CLI |
//! | speech | Audio | `whisper` CLI |

pub mod office;
pub mod ocr;
pub mod pdf;
pub mod signature;
pub mod speech;
pub mod svg;
pub mod text;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use notegraph_core::classify::{profile, ExtractorFamily};
use notegraph_core::models::{ExtractionResult, SourceFile};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ExtractorsConfig;

pub use office::OfficeExtractor;
pub use ocr::OcrExtractor;
pub use pdf::PdfExtractor;
pub use speech::SpeechExtractor;
pub use svg::SvgExtractor;
pub use text::TextExtractor;

/// Failures inside an extractor. Converted to a failed
/// [`ExtractionResult`] before leaving the extractor.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("content does not look like {0}")]
    Signature(&'static str),

    #[error("unsupported format: {0}")]
    Unsupported(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),

    #[error("SVG parsing failed: {0}")]
    Svg(String),

    #[error("{0} unavailable")]
    ToolUnavailable(String),

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub fn into_result(self) -> ExtractionResult {
        ExtractionResult::failed(self.to_string())
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], file: &SourceFile) -> ExtractionResult;
}

/// All extractors for one ingestion run.
///
/// [`ExtractorSet::init`] creates a private scratch directory and checks for the
/// external tools; [`ExtractorSet::shutdown`] removes the directory. Dropping
/// the set without calling `shutdown` removes it as well.
pub struct ExtractorSet {
    scratch: Option<PathBuf>,
    text: TextExtractor,
    pdf: PdfExtractor,
    office: OfficeExtractor,
    svg: SvgExtractor,
    ocr: OcrExtractor,
    speech: SpeechExtractor,
}

impl ExtractorSet {
    pub async fn init(config: &ExtractorsConfig) -> Result<Self> {
        let scratch = std::env::temp_dir().join(format!("notegraph-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&scratch)
            .await
            .with_context(|| format!("Failed to create scratch dir {}", scratch.display()))?;

        let ocr_available = detect_tool(&config.ocr_command, "--version").await;
        if !ocr_available {
            warn!(command = %config.ocr_command, "OCR tool not found; images will be metadata-only");
        }
        let speech_available = match &config.speech_command {
            Some(cmd) => {
                let ok = detect_tool(cmd, "--help").await;
                if !ok {
                    warn!(command = %cmd, "speech tool not found; audio will be metadata-only");
                }
                ok
            }
            None => false,
        };
        debug!(scratch = %scratch.display(), ocr_available, speech_available, "extractors ready");

        Ok(Self {
            text: TextExtractor,
            pdf: PdfExtractor,
            office: OfficeExtractor::new(config.office_max_sheets),
            svg: SvgExtractor,
            ocr: OcrExtractor::new(config, &scratch, ocr_available),
            speech: SpeechExtractor::new(config, &scratch, speech_available),
            scratch: Some(scratch),
        })
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_deref()
    }

    fn for_family(&self, family: ExtractorFamily) -> Option<&dyn Extractor> {
        match family {
            ExtractorFamily::Text => Some(&self.text),
            ExtractorFamily::Pdf => Some(&self.pdf),
            ExtractorFamily::Office => Some(&self.office),
            ExtractorFamily::Svg => Some(&self.svg),
            ExtractorFamily::Ocr => Some(&self.ocr),
            ExtractorFamily::Speech => Some(&self.speech),
            ExtractorFamily::None => None,
        }
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(dir) = self.scratch.take() {
            tokio::fs::remove_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to remove scratch dir {}", dir.display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Extractor for ExtractorSet {
    async fn extract(&self, bytes: &[u8], file: &SourceFile) -> ExtractionResult {
        match self.for_family(profile(file.content_type).family) {
            Some(extractor) => extractor.extract(bytes, file).await,
            None => ExtractionResult::from_text(String::new()),
        }
    }
}

impl Drop for ExtractorSet {
    fn drop(&mut self) {
        if let Some(dir) = self.scratch.take() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}

/// Whether `command arg` runs and exits successfully.
pub async fn detect_tool(command: &str, arg: &str) -> bool {
    tokio::process::Command::new(command)
        .arg(arg)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}
