//! Index store: build, persist, reload.
//!
//! [`build_or_load_index`] returns the persisted index when it still matches
//! the KB directory, and otherwise rebuilds it from scratch:
//!
//! ```text
//! scan files ─▶ fresh? ──yes──▶ load JSON (no embedding calls)
//!                 │
//!                 no
//!                 ▼
//!   load text ─▶ chunk ─▶ embed (one batch) ─▶ persist (tmp + rename)
//! ```
//!
//! An index is fresh when its `(path, mtime)` set equals the current one
//! (mtimes rounded to microseconds), it was built with the active embedding
//! model, and it has at least one chunk. Any single file change triggers a
//! full re-embed of every file; there is no per-file patching.
//!
//! [`KnowledgeBase`] holds the live index as an `Arc` snapshot that is
//! swapped whole on reload, so in-flight queries keep reading the old one.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::loader::{self, KbFile};
use crate::models::{file_key_set, Chunk, FileRecord, Index};

/// Return the persisted index if fresh, otherwise rebuild and persist it.
///
/// # Errors
///
/// Only a failing embedding backend during a rebuild (or an invalid
/// `kb.exclude_globs` pattern) is an error. Unreadable files, a corrupt
/// index file, an empty KB, and a failed write are logged and tolerated.
pub async fn build_or_load_index(config: &Config, embedder: &dyn Embedder) -> Result<Index> {
    let kb_dir = &config.kb.dir;
    let index_path = &config.kb.index_path;

    if let Err(e) = std::fs::create_dir_all(kb_dir) {
        warn!("[KB] cannot create {}: {}", kb_dir.display(), e);
    }

    if !embedder.is_available() {
        info!("[KB] embeddings unavailable: indexing for lexical search only");
    }

    let files = loader::scan_kb_files(kb_dir, &config.kb.exclude_globs)?;
    let records: Vec<FileRecord> = files.iter().map(|f| f.record.clone()).collect();

    if index_path.exists() {
        match load_index(index_path) {
            Ok(idx) if is_fresh(&idx, &records, embedder.model_name()) => {
                info!("[KB] loaded index: {}", index_path.display());
                return Ok(idx);
            }
            Ok(_) => info!("[KB] index is stale, rebuilding"),
            Err(e) => warn!("[KB] cannot read index ({:#}), rebuilding", e),
        }
    }

    rebuild(config, embedder, &files, records).await
}

async fn rebuild(
    config: &Config,
    embedder: &dyn Embedder,
    files: &[KbFile],
    records: Vec<FileRecord>,
) -> Result<Index> {
    let mut chunks: Vec<Chunk> = Vec::new();

    for file in files {
        let text = loader::load_document(file);
        if text.trim().is_empty() {
            continue;
        }
        for (i, piece) in chunk_text(&text, &config.chunking).into_iter().enumerate() {
            chunks.push(Chunk {
                text: piece,
                source: file.record.path.clone(),
                sequence_index: i,
                kind: file.kind,
                embedding: Vec::new(),
            });
        }
    }

    if chunks.is_empty() {
        warn!(
            "[KB] no content; put .txt or .pdf files in {}",
            config.kb.dir.display()
        );
        return Ok(Index::empty(embedder.model_name()));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder
        .embed(&texts)
        .await
        .context("Failed to embed knowledge-base chunks")?;
    if vectors.len() != chunks.len() {
        bail!(
            "Embedder returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        );
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != embedder.dims()) {
        bail!(
            "Embedder returned a {}-dimensional vector, expected {}",
            v.len(),
            embedder.dims()
        );
    }
    for (chunk, vector) in chunks.iter_mut().zip(vectors) {
        chunk.embedding = vector;
    }

    let index = Index {
        embedding_model_id: embedder.model_name().to_string(),
        files: records,
        chunks,
        built_at: Some(chrono::Utc::now()),
    };

    match persist_index(&config.kb.index_path, &index) {
        Ok(()) => info!(
            "[KB] built index with {} chunks from {} files",
            index.chunk_count(),
            index.files.len()
        ),
        Err(e) => warn!("[KB] failed to save index: {:#}", e),
    }

    Ok(index)
}

/// Whether a persisted index can be reused for the given files and model.
pub fn is_fresh(index: &Index, current: &[FileRecord], model: &str) -> bool {
    !index.chunks.is_empty()
        && index.embedding_model_id == model
        && index.file_key_set() == file_key_set(current)
}

pub fn load_index(path: &Path) -> Result<Index> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read index file: {}", path.display()))?;
    let index: Index = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse index file: {}", path.display()))?;
    Ok(index)
}

/// Write the index as JSON via a temp file and rename, so readers never see
/// a partial file.
pub fn persist_index(path: &Path, index: &Index) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let tmp = temp_path(path);
    let json = serde_json::to_vec(index)?;
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move index into place: {}", path.display()))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Shared handle to the live index.
///
/// Queries take a [`snapshot`](KnowledgeBase::snapshot) and work on it;
/// reloads replace the whole snapshot at once.
pub struct KnowledgeBase {
    current: RwLock<Arc<Index>>,
}

impl KnowledgeBase {
    pub fn new(index: Index) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    pub fn snapshot(&self) -> Arc<Index> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in a new index, returning the previous one.
    pub fn replace(&self, index: Index) -> Arc<Index> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(index))
    }

    /// Rebuild (or reload) from disk and swap on success. On failure the
    /// current index stays in place.
    pub async fn reload(&self, config: &Config, embedder: &dyn Embedder) -> Result<usize> {
        let index = build_or_load_index(config, embedder).await?;
        let count = index.chunk_count();
        self.replace(index);
        Ok(count)
    }

    pub fn chunk_count(&self) -> usize {
        self.snapshot().chunk_count()
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new(Index::empty("disabled"))
    }
}
