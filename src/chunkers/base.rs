//! Base trait for all chunkers, plus post-processing shared between them.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::ChunkError;
use crate::types::{estimate_tokens, Chunk, ChunkConfig, ChunkType, PageSpan, SourceDocument};

/// The core trait that all chunkers must implement.
///
/// A chunker takes an extracted document and splits it into bounded chunks
/// suitable for embedding and retrieval. Empty or malformed text yields fewer
/// chunks (possibly none), never an error.
pub trait Chunker: Send + Sync {
    /// Get the name of this chunker.
    fn name(&self) -> &'static str;

    /// Chunk the given document with the provided configuration.
    ///
    /// # Errors
    /// Only [`ChunkError::InvalidConfig`] when `config` makes chunking
    /// impossible.
    fn chunk(&self, document: &SourceDocument, config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkError>;

    /// Get the description of this chunker.
    fn description(&self) -> &'static str {
        "A text chunker"
    }
}

/// Merge chunks whose token estimate is below `config.min_tokens` into a
/// neighbour, then number the survivors.
///
/// A small chunk is absorbed by its predecessor; a small first chunk absorbs
/// its successor. Text shared by the two (window overlap) is not repeated.
/// Afterwards every chunk meets the minimum unless only one chunk remains.
pub fn merge_undersized(chunks: Vec<Chunk>, config: &ChunkConfig) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    let mut absorbed_into: HashMap<Uuid, Uuid> = HashMap::new();

    for chunk in chunks {
        match merged.last_mut() {
            Some(prev)
                if chunk.metadata.token_count < config.min_tokens
                    || prev.metadata.token_count < config.min_tokens =>
            {
                absorbed_into.insert(chunk.id, prev.id);
                absorb(prev, chunk, config.chars_per_token);
            }
            _ => merged.push(chunk),
        }
    }

    for (index, chunk) in merged.iter_mut().enumerate() {
        chunk.metadata.chunk_index = index;
        if let Some(target) = chunk.metadata.overlap_with {
            let resolved = absorbed_into.get(&target).copied().unwrap_or(target);
            chunk.metadata.overlap_with = (resolved != chunk.id).then_some(resolved);
        }
    }

    merged
}

fn absorb(prev: &mut Chunk, next: Chunk, chars_per_token: usize) {
    prev.text = join_without_overlap(&prev.text, &next.text);
    prev.metadata.token_count = estimate_tokens(&prev.text, chars_per_token);

    let meta = &mut prev.metadata;
    let other = next.metadata;
    meta.char_range = meta.char_range.start..meta.char_range.end.max(other.char_range.end);
    meta.paragraph_range = union(meta.paragraph_range.take(), other.paragraph_range);
    meta.sentence_range = union(meta.sentence_range.take(), other.sentence_range);
    meta.token_range = union(meta.token_range.take(), other.token_range);
    meta.page_span = match (meta.page_span, other.page_span) {
        (Some(a), Some(b)) => Some(PageSpan {
            start: a.start.min(b.start),
            end: a.end.max(b.end),
        }),
        (a, b) => a.or(b),
    };

    if prev.chunk_type != ChunkType::TokenWindow {
        prev.chunk_type = ChunkType::Merged;
    }
}

fn union(
    a: Option<std::ops::Range<usize>>,
    b: Option<std::ops::Range<usize>>,
) -> Option<std::ops::Range<usize>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.start.min(b.start)..a.end.max(b.end)),
        (a, b) => a.or(b),
    }
}

/// Join two texts, dropping the longest word-aligned prefix of `next` that
/// `prev` already ends with.
pub fn join_without_overlap(prev: &str, next: &str) -> String {
    let prev = prev.trim_end();
    let next = next.trim_start();

    let overlap = next
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(next.len()))
        .filter(|&k| k > 0 && (k == next.len() || next[k..].starts_with(char::is_whitespace)))
        .rev()
        .find(|&k| {
            prev.ends_with(&next[..k])
                && prev[..prev.len() - k]
                    .chars()
                    .last()
                    .map_or(true, char::is_whitespace)
        });

    match overlap {
        Some(k) => {
            let rest = next[k..].trim_start();
            if rest.is_empty() {
                prev.to_string()
            } else {
                format!("{} {}", prev, rest)
            }
        }
        None => format!("{} {}", prev, next),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;
    use pretty_assertions::assert_eq;

    fn chunk(text: &str, range: std::ops::Range<usize>) -> Chunk {
        Chunk::new(text.to_string(), ChunkType::Paragraph, 4).with_metadata(ChunkMetadata {
            char_range: range,
            ..Default::default()
        })
    }

    #[test]
    fn test_join_without_overlap() {
        assert_eq!(
            join_without_overlap("One. Two. Three.", "Two. Three. Four."),
            "One. Two. Three. Four."
        );
        assert_eq!(join_without_overlap("One.", "Two."), "One. Two.");
        assert_eq!(join_without_overlap("One. Two.", "Two."), "One. Two.");
        // Only whole words count as overlap
        assert_eq!(join_without_overlap("The cat.", "at. Dog."), "The cat. at. Dog.");
    }

    #[test]
    fn test_small_chunk_merges_into_predecessor() {
        let config = ChunkConfig::default().with_min_tokens(5);
        let chunks = vec![
            chunk("The commission denied the claim for benefits.", 0..46),
            chunk("It ended.", 47..56),
        ];
        let merged = merge_undersized(chunks, &config);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "The commission denied the claim for benefits. It ended.");
        assert_eq!(merged[0].metadata.char_range, 0..56);
        assert_eq!(merged[0].chunk_type, ChunkType::Merged);
    }

    #[test]
    fn test_small_first_chunk_absorbs_successor() {
        let config = ChunkConfig::default().with_min_tokens(5);
        let chunks = vec![
            chunk("It began.", 0..9),
            chunk("The commission denied the claim for benefits.", 10..56),
            chunk("The relator then filed this action in mandamus.", 57..104),
        ];
        let merged = merge_undersized(chunks, &config);
        assert_eq!(merged.len(), 2);
        assert!(merged[0].text.starts_with("It began. The commission"));
        assert_eq!(merged[1].metadata.chunk_index, 1);
        assert!(merged.iter().all(|c| c.metadata.token_count >= 5));
    }

    #[test]
    fn test_overlap_links_follow_absorbed_chunks() {
        let config = ChunkConfig::default().with_min_tokens(5);
        let first = chunk("The commission denied the claim for benefits.", 0..46);
        let mut small = chunk("It ended.", 47..56);
        small.metadata.overlap_with = Some(first.id);
        let mut third = chunk("The relator then filed this action in mandamus.", 57..104);
        third.metadata.overlap_with = Some(small.id);
        let first_id = first.id;

        let merged = merge_undersized(vec![first, small, third], &config);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].metadata.overlap_with, None);
        assert_eq!(merged[1].metadata.overlap_with, Some(first_id));
    }

    #[test]
    fn test_single_small_chunk_is_kept() {
        let config = ChunkConfig::default().with_min_tokens(50);
        let merged = merge_undersized(vec![chunk("Only this.", 0..10)], &config);
        assert_eq!(merged.len(), 1);
    }
}
