//! Core data models for the knowledge base.
//!
//! These types are the persisted shape of the index: chunks with their
//! vectors, plus the file records used to decide whether the index on disk
//! still matches the KB directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of source document a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Text,
    Pdf,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Text => "text",
            ChunkKind::Pdf => "pdf",
        }
    }
}

/// A bounded segment of a KB document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Path of the source file relative to the KB root, `/`-separated.
    pub source: String,
    /// Position of this chunk within its source file, starting at 0.
    pub sequence_index: usize,
    pub kind: ChunkKind,
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Display tag used by the context packer, e.g. `[manual.txt • 3]`.
    pub fn tag(&self) -> String {
        format!("[{} • {}]", self.source, self.sequence_index)
    }

    /// Identity of a chunk inside one index.
    pub fn key(&self) -> (&str, usize) {
        (self.source.as_str(), self.sequence_index)
    }
}

/// On-disk KB source file, used only for staleness detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    /// Modification time as fractional seconds since the Unix epoch.
    pub modified_time: f64,
}

impl FileRecord {
    /// Comparison key with the mtime rounded to 6 decimal digits, halves
    /// to even.
    pub fn freshness_key(&self) -> (String, i64) {
        (
            self.path.clone(),
            (self.modified_time * 1e6).round_ties_even() as i64,
        )
    }
}

/// The persisted knowledge-base index.
///
/// `files` and `chunks` are always replaced together; an index is never
/// patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    #[serde(rename = "model")]
    pub embedding_model_id: String,
    pub files: Vec<FileRecord>,
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub built_at: Option<DateTime<Utc>>,
}

impl Index {
    pub fn empty(embedding_model_id: &str) -> Self {
        Self {
            embedding_model_id: embedding_model_id.to_string(),
            files: Vec::new(),
            chunks: Vec::new(),
            built_at: None,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Order-independent set of `(path, rounded mtime)` pairs.
    pub fn file_key_set(&self) -> BTreeSet<(String, i64)> {
        file_key_set(&self.files)
    }
}

pub fn file_key_set(files: &[FileRecord]) -> BTreeSet<(String, i64)> {
    files.iter().map(FileRecord::freshness_key).collect()
}
