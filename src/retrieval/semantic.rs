//! Semantic ranking with near-duplicate suppression.

use std::cmp::Ordering;

use super::similarity::cosine_similarity;
use crate::error::RetrievalError;
use crate::types::{Chunk, MatchType, RetrievalConfig, RetrievalResult};

/// Check `top_k` against `1..=max`.
pub fn validate_top_k(top_k: usize, max: usize) -> Result<(), RetrievalError> {
    if top_k == 0 || top_k > max {
        return Err(RetrievalError::TopKOutOfRange { top_k, max });
    }
    Ok(())
}

/// Greedy, order-preserving deduplication of embedded chunks.
///
/// A chunk is kept only if its similarity to every chunk already kept is at
/// most `threshold`. Chunks without embeddings are skipped.
pub fn dedup_by_similarity<'a, I>(chunks: I, threshold: f32) -> Vec<&'a Chunk>
where
    I: IntoIterator<Item = &'a Chunk>,
{
    let mut kept: Vec<(&'a Chunk, &'a [f32])> = Vec::new();
    for chunk in chunks {
        let Some(embedding) = chunk.embedding.as_deref() else {
            continue;
        };
        if kept
            .iter()
            .all(|(_, other)| cosine_similarity(embedding, other) <= threshold)
        {
            kept.push((chunk, embedding));
        }
    }
    kept.into_iter().map(|(chunk, _)| chunk).collect()
}

/// Rank chunks against a question embedding and return the top `top_k`.
///
/// # Errors
/// [`RetrievalError::TopKOutOfRange`] for a `top_k` outside
/// `1..=max_top_k`, and [`RetrievalError::NoEmbeddings`] when no chunk has
/// an embedding.
pub fn semantic_search(
    chunks: &[Chunk],
    query: &[f32],
    top_k: usize,
    config: &RetrievalConfig,
) -> Result<Vec<RetrievalResult>, RetrievalError> {
    validate_top_k(top_k, config.max_top_k)?;
    rank(chunks, query, top_k, config.dedup_threshold)
}

/// Ranking without the user-facing `top_k` bound; the hybrid search uses it
/// for its larger semantic candidate set.
pub(crate) fn rank(
    chunks: &[Chunk],
    query: &[f32],
    limit: usize,
    dedup_threshold: f32,
) -> Result<Vec<RetrievalResult>, RetrievalError> {
    if !chunks.iter().any(|c| c.embedding.is_some()) {
        return Err(RetrievalError::NoEmbeddings);
    }

    let mut results: Vec<RetrievalResult> = dedup_by_similarity(chunks, dedup_threshold)
        .into_iter()
        .map(|chunk| {
            let score = chunk
                .embedding
                .as_deref()
                .map_or(0.0, |e| cosine_similarity(query, e));
            RetrievalResult {
                chunk: chunk.clone(),
                score,
                match_type: MatchType::Semantic,
                keyword_match: None,
            }
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results.truncate(limit);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkType;

    fn embedded(text: &str, embedding: Vec<f32>) -> Chunk {
        Chunk::new(text.to_string(), ChunkType::Paragraph, 4).with_embedding(embedding)
    }

    /// A and B are near duplicates (0.95); C is far from both (0.2).
    fn abc() -> Vec<Chunk> {
        let b_y = (1.0f32 - 0.95 * 0.95).sqrt();
        let c_y = (1.0f32 - 0.2 * 0.2).sqrt();
        vec![
            embedded("Chunk A.", vec![1.0, 0.0, 0.0]),
            embedded("Chunk B.", vec![0.95, b_y, 0.0]),
            embedded("Chunk C.", vec![0.2, 0.0, c_y]),
        ]
    }

    #[test]
    fn test_dedup_keeps_a_and_c() {
        let chunks = abc();
        let kept: Vec<&str> = dedup_by_similarity(&chunks, 0.85)
            .into_iter()
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(kept, vec!["Chunk A.", "Chunk C."]);
    }

    #[test]
    fn test_ranking_order_and_truncation() {
        let config = RetrievalConfig::default();
        let chunks = abc();
        let results = semantic_search(&chunks, &[0.0, 0.0, 1.0], 1, &config).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.text, "Chunk C.");
        assert_eq!(results[0].match_type, MatchType::Semantic);

        let results = semantic_search(&chunks, &[1.0, 0.0, 0.0], 10, &config).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_chunks_without_embeddings_are_excluded() {
        let mut chunks = abc();
        chunks.push(Chunk::new("Unembedded.".into(), ChunkType::Paragraph, 4));
        let results = semantic_search(&chunks, &[1.0, 0.0, 0.0], 50, &RetrievalConfig::default()).unwrap();
        assert!(results.iter().all(|r| r.chunk.embedding.is_some()));
    }

    #[test]
    fn test_no_embeddings_is_an_error() {
        let chunks = vec![Chunk::new("Plain.".into(), ChunkType::Paragraph, 4)];
        let err = semantic_search(&chunks, &[1.0], 5, &RetrievalConfig::default()).unwrap_err();
        assert!(matches!(err, RetrievalError::NoEmbeddings));
    }

    #[test]
    fn test_top_k_bounds() {
        let config = RetrievalConfig::default();
        let chunks = abc();
        assert!(matches!(
            semantic_search(&chunks, &[1.0, 0.0, 0.0], 0, &config),
            Err(RetrievalError::TopKOutOfRange { top_k: 0, max: 50 })
        ));
        assert!(semantic_search(&chunks, &[1.0, 0.0, 0.0], 51, &config).is_err());
        assert!(semantic_search(&chunks, &[1.0, 0.0, 0.0], 50, &config).is_ok());
    }
}
