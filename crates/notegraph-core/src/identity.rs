//! Deterministic chunk identifiers.
//!
//! Ids are positional: `{namespace}_{source}_{index}_{hash}` where `hash` is
//! the first 8 hex digits of `md5("{source}_{index}")`. They depend only on
//! the source identifier and the chunk index, never on chunk text.

use crate::models::{SourceFile, SourceType};

pub fn chunk_id(namespace: &str, source_identifier: &str, chunk_index: usize) -> String {
    let digest = format!(
        "{:x}",
        md5::compute(format!("{}_{}", source_identifier, chunk_index))
    );
    format!(
        "{}_{}_{}_{}",
        namespace,
        source_identifier,
        chunk_index,
        &digest[..8]
    )
}

/// Stable identifier for a source file.
///
/// Notes use their vault-relative path without extension. Other files use
/// the first 16 hex digits of the md5 of their relative path, so the id
/// survives edits to the file.
pub fn source_identifier(file: &SourceFile) -> String {
    match file.source_type() {
        SourceType::Obsidian => {
            let rel = file.relative_path.as_str();
            let name = file.file_name();
            match name.rfind('.') {
                Some(pos) if pos > 0 => rel[..rel.len() - (name.len() - pos)].to_string(),
                _ => rel.to_string(),
            }
        }
        SourceType::MultiModal => {
            let digest = format!("{:x}", md5::compute(&file.relative_path));
            digest[..16].to_string()
        }
    }
}
