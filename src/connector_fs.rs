//! Vault walker.
//!
//! Walks the configured vault root, applies include/exclude globs to
//! `/`-separated relative paths, classifies each file, and returns the
//! resulting [`SourceFile`]s in path order. File contents are not read here.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use notegraph_core::classify::{classify, mime_for};
use notegraph_core::models::SourceFile;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::VaultConfig;

/// Always excluded, in addition to the configured patterns.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/.obsidian/**",
    "**/.trash/**",
    "**/node_modules/**",
];

pub fn scan_vault(vault: &VaultConfig) -> Result<Vec<SourceFile>> {
    let root = &vault.root;
    if !root.is_dir() {
        bail!("Vault root does not exist or is not a directory: {}", root.display());
    }

    let include_set = build_globset(&vault.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(vault.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(vault.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            // The root itself being unreadable is fatal; anything below it is not.
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("Failed to read vault root {}", root.display()))
            }
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = relative_path(path, root);
        if exclude_set.is_match(&relative) || !include_set.is_match(&relative) {
            continue;
        }

        match source_file(path, relative) {
            Ok(file) => files.push(file),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping file"),
        }
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!(count = files.len(), root = %root.display(), "vault scanned");
    Ok(files)
}

/// Whether `path` (relative, `/`-separated) matches a glob pattern.
///
/// `**` spans any number of path segments, `*` and `?` stay within one
/// segment. An invalid pattern matches nothing.
pub fn matches_pattern(path: &str, pattern: &str) -> bool {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher().is_match(path))
        .unwrap_or(false)
}

fn relative_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn source_file(path: &Path, relative_path: String) -> Result<SourceFile> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let created = metadata.created().unwrap_or(modified);
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    Ok(SourceFile {
        content_type: classify(path),
        mime_type: Some(mime_for(path).to_string()),
        path: absolute,
        relative_path,
        size_bytes: metadata.len(),
        created_at: DateTime::<Utc>::from(created),
        modified_at: DateTime::<Utc>::from(modified),
        checksum: None,
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
