//! Context packer: joins retrieved chunks into one prompt-ready block.

use crate::models::Chunk;

/// Separator placed between packed blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Default character budget for packed KB context.
pub const DEFAULT_MAX_CHARS: usize = 5000;

/// Concatenate chunks as `"[source • index]\ntext"` blocks, in order.
///
/// Stops before the first block that would push the running total (block
/// lengths, separators excluded) past `max_chars`. The first block is always
/// included, even when it alone exceeds the budget. Blocks are never cut.
pub fn pack_snippets(chunks: &[&Chunk], max_chars: usize) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut total = 0usize;

    for chunk in chunks {
        let block = format!("{}\n{}", chunk.tag(), chunk.text.trim());
        let len = block.chars().count();
        if total + len > max_chars && !blocks.is_empty() {
            break;
        }
        total += len;
        blocks.push(block);
    }

    blocks.join(BLOCK_SEPARATOR)
}
