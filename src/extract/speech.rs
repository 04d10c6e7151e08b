//! Audio transcription through the `whisper` command-line tool.
//!
//! Whisper writes `<stem>.json` with the transcript, detected language, and
//! per-segment `avg_logprob`. Confidence is the mean segment probability
//! (`exp(avg_logprob)`), gated against `speech_min_confidence`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notegraph_core::models::{ContentType, ExtractionResult, SourceFile};
use serde::Deserialize;
use tracing::debug;

use super::{signature, ExtractError, Extractor};
use crate::config::ExtractorsConfig;

pub struct SpeechExtractor {
    command: Option<String>,
    model: String,
    min_confidence: f32,
    scratch: PathBuf,
    available: bool,
}

#[derive(Debug, Deserialize)]
pub struct WhisperOutput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
pub struct WhisperSegment {
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub avg_logprob: Option<f64>,
}

impl WhisperOutput {
    /// Mean of `exp(avg_logprob)` over segments, in `[0, 1]`.
    pub fn confidence(&self) -> f32 {
        let probs: Vec<f64> = self
            .segments
            .iter()
            .filter_map(|s| s.avg_logprob)
            .map(|lp| lp.exp().clamp(0.0, 1.0))
            .collect();
        if probs.is_empty() {
            return 0.0;
        }
        (probs.iter().sum::<f64>() / probs.len() as f64) as f32
    }

    pub fn duration_secs(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }

    pub fn into_result(self, min_confidence: f32) -> ExtractionResult {
        let confidence = self.confidence();
        let duration = self.duration_secs();
        let segments = self.segments.len();
        let mut result = ExtractionResult::from_text(self.text.trim())
            .with_confidence(confidence, min_confidence)
            .with_detail("duration_secs", duration)
            .with_detail("segments", segments);
        if let Some(lang) = self.language {
            result = result.with_language(lang);
        }
        result
    }
}

impl SpeechExtractor {
    pub fn new(config: &ExtractorsConfig, scratch: &Path, available: bool) -> Self {
        Self {
            command: config.speech_command.clone(),
            model: config.speech_model.clone(),
            min_confidence: config.speech_min_confidence,
            scratch: scratch.to_path_buf(),
            available,
        }
    }

    async fn run(&self, bytes: &[u8], file: &SourceFile) -> Result<ExtractionResult, ExtractError> {
        let command = match (&self.command, self.available) {
            (Some(cmd), true) => cmd,
            (Some(cmd), false) => return Err(ExtractError::ToolUnavailable(format!("speech ({})", cmd))),
            (None, _) => return Err(ExtractError::ToolUnavailable("speech (not configured)".to_string())),
        };
        let ext = file.extension().unwrap_or_else(|| "audio".to_string());
        signature::check(ContentType::Audio, &ext, bytes)?;

        let job = uuid::Uuid::new_v4().to_string();
        let work_dir = self.scratch.join(&job);
        tokio::fs::create_dir_all(&work_dir).await?;
        let outcome = self.transcribe(command, bytes, &work_dir, &job, &ext).await;
        let _ = tokio::fs::remove_dir_all(&work_dir).await;

        let transcript = outcome?;
        debug!(
            file = %file.relative_path,
            segments = transcript.segments.len(),
            confidence = transcript.confidence(),
            "transcription done"
        );
        Ok(transcript.into_result(self.min_confidence))
    }

    async fn transcribe(
        &self,
        command: &str,
        bytes: &[u8],
        work_dir: &Path,
        job: &str,
        ext: &str,
    ) -> Result<WhisperOutput, ExtractError> {
        let input = work_dir.join(format!("{}.{}", job, ext));
        tokio::fs::write(&input, bytes).await?;
        let output = tokio::process::Command::new(command)
            .arg(&input)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(work_dir)
            .output()
            .await?;
        if !output.status.success() {
            return Err(ExtractError::Tool {
                tool: command.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let json = tokio::fs::read(work_dir.join(format!("{}.json", job))).await?;
        serde_json::from_slice(&json).map_err(|e| ExtractError::Tool {
            tool: command.to_string(),
            message: format!("unreadable transcript: {}", e),
        })
    }
}

#[async_trait]
impl Extractor for SpeechExtractor {
    async fn extract(&self, bytes: &[u8], file: &SourceFile) -> ExtractionResult {
        self.run(bytes, file)
            .await
            .unwrap_or_else(ExtractError::into_result)
    }
}
