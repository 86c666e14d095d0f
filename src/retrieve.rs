//! Hybrid retrieval: literal token hits first, semantic neighbours second.
//!
//! 1. Tokenize the query (lowercase runs of Latin letters, digits and the
//!    Ukrainian alphabet; ъ, ы, э and ё end a token).
//! 2. Count, per chunk, how many distinct tokens occur as substrings of the
//!    lowercased text. Chunks with at least one hit are ranked by hit count
//!    (stable, so ties keep index order) and the top `k` are kept.
//! 3. With a live embedder, up to `semantic_extra` more chunks are appended
//!    from a cosine ranking over the whole index, skipping ones already kept.
//! 4. With no literal hits at all, the result is the top `k` by cosine
//!    similarity, or nothing in degraded mode.
//!
//! Exact terms such as model numbers and part codes therefore always
//! outrank fuzzy matches. Retrieval never fails: a query-embedding error is
//! logged and the lexical result (possibly empty) is returned.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::warn;

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::models::{Chunk, Index};

/// Default number of semantic fillers appended after literal hits.
pub const SEMANTIC_EXTRA: usize = 2;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zа-щьюяєіїґ0-9]+").unwrap());

/// Extract the query tokens used for literal matching.
///
/// Kept: all-digit tokens of any length, tokens of 4+ characters, and
/// 3-character tokens made only of ASCII letters/digits (short codes and
/// model names). Duplicates are dropped, first occurrence wins.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut tokens: Vec<String> = Vec::new();

    for m in TOKEN_RE.find_iter(&lowered) {
        let token = m.as_str();
        let len = token.chars().count();
        let keep = token.chars().all(|c| c.is_ascii_digit())
            || len >= 4
            || (len >= 3 && token.chars().all(|c| c.is_ascii_alphanumeric()));
        if keep && !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }

    tokens
}

/// Number of tokens that occur in `text_lower`.
pub fn literal_hits(text_lower: &str, tokens: &[String]) -> usize {
    tokens
        .iter()
        .filter(|t| text_lower.contains(t.as_str()))
        .count()
}

/// Retrieve up to `k` literal matches plus up to [`SEMANTIC_EXTRA`] fillers.
pub async fn retrieve<'a>(
    index: &'a Index,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Vec<&'a Chunk> {
    retrieve_with_extra(index, embedder, query, k, SEMANTIC_EXTRA).await
}

/// Like [`retrieve`], with a configurable number of semantic fillers.
pub async fn retrieve_with_extra<'a>(
    index: &'a Index,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
    semantic_extra: usize,
) -> Vec<&'a Chunk> {
    if index.is_empty() {
        return Vec::new();
    }

    let tokens = tokenize_query(query);
    let mut literal: Vec<(usize, &Chunk)> = Vec::new();

    if !tokens.is_empty() {
        for chunk in &index.chunks {
            let hits = literal_hits(&chunk.text.to_lowercase(), &tokens);
            if hits > 0 {
                literal.push((hits, chunk));
            }
        }
    }

    if !literal.is_empty() {
        // sort_by is stable: equal hit counts keep index order
        literal.sort_by(|a, b| b.0.cmp(&a.0));
        let mut top: Vec<&Chunk> = literal.into_iter().take(k).map(|(_, c)| c).collect();

        if !embedder.is_available() || semantic_extra == 0 {
            return top;
        }

        let query_vec = match embed_query(embedder, query).await {
            Ok(v) => v,
            Err(e) => {
                warn!("[KB] query embedding failed, using literal hits only: {:#}", e);
                return top;
            }
        };

        let kept: HashSet<(&str, usize)> = top.iter().map(|c| c.key()).collect();
        let fillers: Vec<&Chunk> = rank_semantic(&index.chunks, &query_vec)
            .into_iter()
            .filter(|c| !kept.contains(&c.key()))
            .take(semantic_extra)
            .collect();
        top.extend(fillers);
        return top;
    }

    if !embedder.is_available() {
        return Vec::new();
    }

    match embed_query(embedder, query).await {
        Ok(query_vec) => rank_semantic(&index.chunks, &query_vec)
            .into_iter()
            .take(k)
            .collect(),
        Err(e) => {
            warn!("[KB] query embedding failed, no semantic results: {:#}", e);
            Vec::new()
        }
    }
}

/// All chunks ordered by cosine similarity to `query_vec`, best first.
fn rank_semantic<'a>(chunks: &'a [Chunk], query_vec: &[f32]) -> Vec<&'a Chunk> {
    let mut scored: Vec<(f32, &Chunk)> = chunks
        .iter()
        .map(|c| (cosine_similarity(query_vec, &c.embedding), c))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledEmbedder;
    use crate::models::ChunkKind;
    use anyhow::Result;
    use async_trait::async_trait;

    const VOCAB: [&str; 6] = ["antenna", "cable", "motor", "sprayer", "soil", "power"];

    /// Bag-of-words embedder over a tiny vocabulary.
    struct VocabEmbedder;

    fn vocab_vec(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCAB
            .iter()
            .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
            .collect()
    }

    #[async_trait]
    impl Embedder for VocabEmbedder {
        fn model_name(&self) -> &str {
            "vocab"
        }
        fn dims(&self) -> usize {
            VOCAB.len()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vocab_vec(t)).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "vocab"
        }
        fn dims(&self) -> usize {
            VOCAB.len()
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("service down")
        }
    }

    fn chunk(source: &str, i: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: source.to_string(),
            sequence_index: i,
            kind: ChunkKind::Text,
            embedding: vocab_vec(text),
        }
    }

    fn index_of(chunks: Vec<Chunk>) -> Index {
        Index {
            embedding_model_id: "vocab".to_string(),
            files: Vec::new(),
            chunks,
            built_at: None,
        }
    }

    fn sources(hits: &[&Chunk]) -> Vec<String> {
        hits.iter().map(|c| c.tag()).collect()
    }

    #[test]
    fn test_tokenize_rules() {
        let tokens = tokenize_query("Antenna RTK v2 5 до антени кут GPS antenna");
        assert_eq!(tokens, vec!["antenna", "rtk", "5", "антени", "gps"]);
    }

    #[test]
    fn test_tokenize_keeps_long_digits_and_codes() {
        let tokens = tokenize_query("Part 12, code AB1-x500!");
        assert_eq!(tokens, vec!["part", "12", "code", "ab1", "x500"]);
    }

    #[test]
    fn test_tokenize_splits_on_russian_only_letters() {
        assert_eq!(tokenize_query("Насосы"), vec!["насос"]);
        assert_eq!(tokenize_query("объём"), Vec::<String>::new());
        assert_eq!(tokenize_query("подъёмник"), vec!["мник"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize_query("a б ?!").is_empty());
    }

    #[test]
    fn test_literal_hits_counts_distinct_tokens() {
        let tokens = tokenize_query("antenna rtk");
        assert_eq!(literal_hits("install the rtk antenna", &tokens), 2);
        assert_eq!(literal_hits("rtk only", &tokens), 1);
        assert_eq!(literal_hits("nothing here", &tokens), 0);
    }

    #[tokio::test]
    async fn test_literal_first_ranking() {
        let idx = index_of(vec![
            chunk("c.txt", 0, "Sprayer nozzles and soil samples."),
            chunk("b.txt", 0, "Check the RTK correction stream."),
            chunk("a.txt", 0, "Mount the RTK antenna on the cab roof."),
        ]);
        let hits = retrieve(&idx, &DisabledEmbedder, "antenna RTK", 2).await;
        assert_eq!(sources(&hits), vec!["[a.txt • 0]", "[b.txt • 0]"]);
    }

    #[tokio::test]
    async fn test_ties_keep_index_order() {
        let idx = index_of(vec![
            chunk("x.txt", 0, "motor one"),
            chunk("x.txt", 1, "motor two"),
            chunk("x.txt", 2, "motor three"),
        ]);
        let hits = retrieve(&idx, &DisabledEmbedder, "motor", 6).await;
        assert_eq!(
            sources(&hits),
            vec!["[x.txt • 0]", "[x.txt • 1]", "[x.txt • 2]"]
        );
    }

    #[tokio::test]
    async fn test_semantic_filler_appended() {
        let idx = index_of(vec![
            chunk("a.txt", 0, "RTK antenna mounting."),
            chunk("b.txt", 0, "Power cable for the antenna."),
            chunk("c.txt", 0, "Soil sampling grid."),
            chunk("d.txt", 0, "Steering motor calibration."),
        ]);
        // k = 1 keeps a.txt (two hits); fillers follow cosine order
        let hits = retrieve(&idx, &VocabEmbedder, "rtk antenna", 1).await;
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].source, "a.txt");
        assert_eq!(hits[1].source, "b.txt");
        let unique: HashSet<_> = hits.iter().map(|c| c.key()).collect();
        assert_eq!(unique.len(), hits.len());
    }

    #[tokio::test]
    async fn test_result_capped_at_k_plus_extra() {
        let chunks = (0..10)
            .map(|i| chunk("m.txt", i, &format!("motor section {}", i)))
            .collect();
        let idx = index_of(chunks);
        let hits = retrieve(&idx, &VocabEmbedder, "motor", 3).await;
        assert_eq!(hits.len(), 5);
    }

    #[tokio::test]
    async fn test_degraded_mode_no_filler() {
        let idx = index_of(vec![
            chunk("a.txt", 0, "RTK antenna mounting."),
            chunk("b.txt", 0, "Power cable for the antenna."),
        ]);
        let hits = retrieve(&idx, &DisabledEmbedder, "rtk", 6).await;
        assert_eq!(sources(&hits), vec!["[a.txt • 0]"]);
    }

    #[tokio::test]
    async fn test_degraded_mode_no_literal_is_empty() {
        let idx = index_of(vec![chunk("a.txt", 0, "RTK antenna mounting.")]);
        let hits = retrieve(&idx, &DisabledEmbedder, "hydraulics", 6).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_pure_semantic_fallback() {
        let idx = index_of(vec![
            chunk("a.txt", 0, "Soil sampling grid."),
            chunk("b.txt", 0, "Sprayer boom sections."),
        ]);
        // "sprayers" is not a substring of either chunk; the embedder still
        // maps it onto the "sprayer" dimension
        let hits = retrieve(&idx, &VocabEmbedder, "sprayers?", 1).await;
        assert_eq!(sources(&hits), vec!["[b.txt • 0]"]);
    }

    #[tokio::test]
    async fn test_embed_failure_keeps_literal_hits() {
        let idx = index_of(vec![chunk("a.txt", 0, "RTK antenna mounting.")]);
        let hits = retrieve(&idx, &FailingEmbedder, "antenna", 6).await;
        assert_eq!(hits.len(), 1);
        let none = retrieve(&idx, &FailingEmbedder, "hydraulics", 6).await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index() {
        let idx = index_of(Vec::new());
        assert!(retrieve(&idx, &VocabEmbedder, "antenna", 6).await.is_empty());
    }
}
