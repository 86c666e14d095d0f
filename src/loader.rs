//! Knowledge-base document loader.
//!
//! Walks the KB directory recursively, picking up `.txt` and `.pdf` files,
//! and extracts their text. Unreadable files are logged and yield empty
//! text; they never abort indexing.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::warn;
use walkdir::WalkDir;

use crate::extract;
use crate::models::{ChunkKind, FileRecord};

/// A KB source file found on disk.
#[derive(Debug, Clone)]
pub struct KbFile {
    pub path: PathBuf,
    pub kind: ChunkKind,
    pub record: FileRecord,
}

/// Classify a path by extension (case-insensitive).
pub fn kind_from_path(path: &Path) -> Option<ChunkKind> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "txt" => Some(ChunkKind::Text),
        "pdf" => Some(ChunkKind::Pdf),
        _ => None,
    }
}

/// Enumerate KB files under `root`, sorted by relative path.
///
/// A missing root yields an empty list.
pub fn scan_kb_files(root: &Path, exclude_globs: &[String]) -> Result<Vec<KbFile>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let exclude_set = build_globset(exclude_globs)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("[KB] skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(kind) = kind_from_path(path) else {
            continue;
        };

        let rel_str = relative_source(root, path);
        if exclude_set.is_match(&rel_str) {
            continue;
        }

        let modified_time = match modified_secs(path) {
            Ok(t) => t,
            Err(e) => {
                warn!("[KB] cannot stat {}: {}", path.display(), e);
                continue;
            }
        };

        files.push(KbFile {
            path: path.to_path_buf(),
            kind,
            record: FileRecord {
                path: rel_str,
                modified_time,
            },
        });
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.record.path.cmp(&b.record.path));

    Ok(files)
}

/// Extract the plain text of a KB file. Failures degrade to an empty string.
pub fn load_document(file: &KbFile) -> String {
    match file.kind {
        ChunkKind::Text => read_text_file(&file.path),
        ChunkKind::Pdf => read_pdf_file(&file.path),
    }
}

fn read_text_file(path: &Path) -> String {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!("[KB] TXT read fail {}: {}", path.display(), e);
            return String::new();
        }
    };
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            warn!("[KB] TXT is not valid UTF-8 {}: {}", path.display(), e);
            String::new()
        }
    }
}

fn read_pdf_file(path: &Path) -> String {
    if !extract::pdf_support_available() {
        warn!("[KB] PDF support unavailable, skipping {}", path.display());
        return String::new();
    }
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!("[KB] PDF read fail {}: {}", path.display(), e);
            return String::new();
        }
    };
    match extract::extract_pdf_text(&bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("[KB] {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// Path relative to the KB root with `/` separators.
fn relative_source(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn modified_secs(path: &Path) -> std::io::Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
