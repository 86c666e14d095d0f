//! Index statistics.
//!
//! A quick summary of what the knowledge base holds: file and chunk counts,
//! per-kind and per-source breakdowns, and whether the vectors are real.
//! Used by `kbctx stats` to confirm that a rebuild picked up the expected
//! files.

use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{ChunkKind, Index};

#[derive(Debug, Clone, PartialEq)]
pub struct SourceStats {
    pub source: String,
    pub kind: ChunkKind,
    pub chunk_count: usize,
    pub chars: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub model: String,
    pub file_count: usize,
    pub chunk_count: usize,
    pub text_chunks: usize,
    pub pdf_chunks: usize,
    pub dims: usize,
    /// True when every vector is the one-element degraded-mode stub.
    pub placeholder_vectors: bool,
    pub built_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Ordered by source path.
    pub sources: Vec<SourceStats>,
}

impl IndexStats {
    pub fn collect(index: &Index) -> Self {
        let mut by_source: BTreeMap<&str, SourceStats> = BTreeMap::new();
        let mut text_chunks = 0;
        let mut pdf_chunks = 0;

        for chunk in &index.chunks {
            match chunk.kind {
                ChunkKind::Text => text_chunks += 1,
                ChunkKind::Pdf => pdf_chunks += 1,
            }
            let entry = by_source
                .entry(chunk.source.as_str())
                .or_insert_with(|| SourceStats {
                    source: chunk.source.clone(),
                    kind: chunk.kind,
                    chunk_count: 0,
                    chars: 0,
                });
            entry.chunk_count += 1;
            entry.chars += chunk.text.chars().count();
        }

        let dims = index.chunks.first().map_or(0, |c| c.embedding.len());
        let placeholder_vectors = !index.chunks.is_empty()
            && index
                .chunks
                .iter()
                .all(|c| c.embedding.len() <= 1 && c.embedding.iter().all(|v| *v == 0.0));

        Self {
            model: index.embedding_model_id.clone(),
            file_count: index.files.len(),
            chunk_count: index.chunks.len(),
            text_chunks,
            pdf_chunks,
            dims,
            placeholder_vectors,
            built_at: index.built_at,
            sources: by_source.into_values().collect(),
        }
    }
}

/// Print the stats table for `index`, persisted at `index_path`.
pub fn print_stats(index: &Index, index_path: &Path) {
    let stats = IndexStats::collect(index);
    let file_size = std::fs::metadata(index_path).map(|m| m.len()).unwrap_or(0);

    println!("KB Context — Index Stats");
    println!("========================");
    println!();
    println!("  Index:       {}", index_path.display());
    println!("  Size:        {}", format_bytes(file_size));
    println!(
        "  Built:       {}",
        stats
            .built_at
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!();
    println!("  Files:       {}", stats.file_count);
    println!(
        "  Chunks:      {} ({} text, {} pdf)",
        stats.chunk_count, stats.text_chunks, stats.pdf_chunks
    );
    println!("  Model:       {}", stats.model);
    if stats.placeholder_vectors {
        println!("  Vectors:     placeholder (lexical search only)");
    } else {
        println!("  Vectors:     {} dims", stats.dims);
    }

    if !stats.sources.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<40} {:>5} {:>8} {:>10}", "SOURCE", "KIND", "CHUNKS", "CHARS");
        println!("  {}", "-".repeat(66));
        for s in &stats.sources {
            println!(
                "  {:<40} {:>5} {:>8} {:>10}",
                s.source,
                s.kind.as_str(),
                s.chunk_count,
                s.chars
            );
        }
    }

    println!();
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
