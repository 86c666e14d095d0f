//! Sliding-window text chunker.
//!
//! Splits normalized document text into overlapping windows of
//! `chunk_size` characters. A window that does not reach the end of the
//! text is cut back to its last `". "` when that boundary lies past
//! `boundary_min_offset`, so chunks tend to end on whole sentences.
//! Fragments shorter than `min_chunk_chars` are dropped. The window keeps
//! sliding after it first reaches the end, so the last `overlap` characters
//! of a long enough text also come out as a chunk of their own.
//!
//! All lengths are counted in characters, not bytes, so Cyrillic text is
//! windowed the same way as Latin text. Output is deterministic for a given
//! input and config.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ChunkingConfig;

static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Collapse space/tab runs to one space and 3+ newlines to a blank line, then trim.
pub fn normalize_whitespace(text: &str) -> String {
    let text = SPACE_RUNS.replace_all(text, " ");
    let text = NEWLINE_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Split text into chunks. The position in the returned vector is the
/// chunk's sequence index within its source.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();
    let total = chars.len();
    let size = config.chunk_size.max(1);

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let end = (start + size).min(total);
        let mut window = &chars[start..end];

        if start + size < total {
            if let Some(dot) = last_sentence_break(window) {
                if dot > config.boundary_min_offset {
                    window = &window[..dot + 1];
                }
            }
        }

        let piece: String = window.iter().collect();
        let piece = piece.trim();
        if piece.chars().count() >= config.min_chunk_chars {
            chunks.push(piece.to_string());
        }

        // Advance from the end of what was kept, minus the overlap.
        start += window.len().saturating_sub(config.overlap).max(1);
    }

    chunks
}

/// Index of the `.` in the last `". "` of the window.
fn last_sentence_break(window: &[char]) -> Option<usize> {
    window
        .windows(2)
        .rposition(|pair| pair[0] == '.' && pair[1] == ' ')
}
