//! Merging semantic and keyword results, and context assembly.

use std::collections::HashSet;

use uuid::Uuid;

use crate::types::RetrievalResult;

/// Semantic results first, then keyword results whose chunk was not already
/// returned semantically. Output chunk ids are unique.
pub fn merge_hybrid(
    semantic: Vec<RetrievalResult>,
    keyword: Vec<RetrievalResult>,
) -> Vec<RetrievalResult> {
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(semantic.len() + keyword.len());
    semantic
        .into_iter()
        .chain(keyword)
        .filter(|r| seen.insert(r.chunk.id))
        .collect()
}

/// Numbered context blocks, `[1] text`, separated by blank lines.
pub fn build_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}", i + 1, r.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
