//! TOML configuration.
//!
//! Every field has a serde default, so a config file only needs the values
//! that differ. [`load_config`] parses and validates in one step and fails
//! fast with a readable message.

use anyhow::{Context, Result};
use notegraph_core::chunk::ChunkingOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    pub vault: VaultConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub extractors: ExtractorsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/notegraph.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub structure_aware: bool,
    #[serde(default)]
    pub inject_context: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            structure_aware: true,
            inject_context: false,
        }
    }
}

impl ChunkingConfig {
    pub fn options(&self) -> ChunkingOptions {
        ChunkingOptions {
            max_chunk_size: self.max_chunk_size,
            chunk_overlap: self.chunk_overlap,
            structure_aware: self.structure_aware,
            inject_context: self.inject_context,
        }
    }
}

fn default_max_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub skip_existing: bool,
    #[serde(default = "default_access")]
    pub access: String,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_true")]
    pub backlinks: bool,
    #[serde(default)]
    pub domain: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            max_file_bytes: default_max_file_bytes(),
            skip_existing: false,
            access: default_access(),
            default_language: default_language(),
            backlinks: true,
            domain: None,
        }
    }
}

fn default_batch_size() -> usize {
    5
}
fn default_batch_delay_ms() -> u64 {
    200
}
fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_access() -> String {
    "private".to_string()
}
fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorsConfig {
    #[serde(default = "default_office_max_sheets")]
    pub office_max_sheets: usize,
    #[serde(default = "default_ocr_command")]
    pub ocr_command: String,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    #[serde(default = "default_ocr_min_confidence")]
    pub ocr_min_confidence: f32,
    #[serde(default)]
    pub speech_command: Option<String>,
    #[serde(default = "default_speech_model")]
    pub speech_model: String,
    #[serde(default = "default_speech_min_confidence")]
    pub speech_min_confidence: f32,
}

impl Default for ExtractorsConfig {
    fn default() -> Self {
        Self {
            office_max_sheets: default_office_max_sheets(),
            ocr_command: default_ocr_command(),
            ocr_language: default_ocr_language(),
            ocr_min_confidence: default_ocr_min_confidence(),
            speech_command: None,
            speech_model: default_speech_model(),
            speech_min_confidence: default_speech_min_confidence(),
        }
    }
}

fn default_office_max_sheets() -> usize {
    100
}
fn default_ocr_command() -> String {
    "tesseract".to_string()
}
fn default_ocr_language() -> String {
    "eng".to_string()
}
fn default_ocr_min_confidence() -> f32 {
    60.0
}
fn default_speech_model() -> String {
    "base".to_string()
}
fn default_speech_min_confidence() -> f32 {
    0.4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL; defaults per provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    config
        .chunking
        .options()
        .validate()
        .map_err(|e| anyhow::anyhow!("chunking: {}", e))?;

    if config.ingest.batch_size == 0 {
        anyhow::bail!("ingest.batch_size must be > 0");
    }
    if config.ingest.max_file_bytes == 0 {
        anyhow::bail!("ingest.max_file_bytes must be > 0");
    }
    if !(0.0..=100.0).contains(&config.extractors.ocr_min_confidence) {
        anyhow::bail!("extractors.ocr_min_confidence must be in [0, 100]");
    }
    if !(0.0..=1.0).contains(&config.extractors.speech_min_confidence) {
        anyhow::bail!("extractors.speech_min_confidence must be in [0.0, 1.0]");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse_config("[vault]\nroot = \"/notes\"\n").unwrap();
        assert_eq!(config.vault.root, PathBuf::from("/notes"));
        assert_eq!(config.vault.include_globs, vec!["**/*"]);
        assert_eq!(config.chunking.max_chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert!(config.chunking.structure_aware);
        assert_eq!(config.ingest.batch_size, 5);
        assert_eq!(config.ingest.batch_delay_ms, 200);
        assert_eq!(config.ingest.access, "private");
        assert_eq!(config.extractors.ocr_min_confidence, 60.0);
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_overlap_must_be_below_max() {
        let err = parse_config(
            "[vault]\nroot = \"/n\"\n[chunking]\nmax_chunk_size = 100\nchunk_overlap = 100\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(parse_config("[vault]\nroot = \"/n\"\n[ingest]\nbatch_size = 0\n").is_err());
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let base = "[vault]\nroot = \"/n\"\n[embedding]\nprovider = \"ollama\"\n";
        assert!(parse_config(base).is_err());
        let full = format!("{}model = \"nomic-embed-text\"\ndims = 768\n", base);
        assert!(parse_config(&full).is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let cfg = "[vault]\nroot = \"/n\"\n[embedding]\nprovider = \"magic\"\nmodel = \"m\"\ndims = 4\n";
        assert!(parse_config(cfg).is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../config/notegraph.example.toml")).unwrap();
        assert_eq!(config.vault.exclude_globs.len(), 3);
        assert_eq!(config.extractors.ocr_command, "tesseract");
        assert!(!config.embedding.is_enabled());
    }
}
