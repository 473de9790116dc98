//! Case-insensitive literal keyword search.

pub use crate::types::normalize_terms;
use crate::types::{Chunk, KeywordMatch, MatchType, RetrievalResult};

/// Count non-overlapping occurrences of `needle` in `haystack`.
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Find chunks containing any of `terms`.
///
/// The score is the total number of occurrences across all terms. Results
/// are sorted by score, highest first; ties keep chunk order.
pub fn keyword_search<S: AsRef<str>>(chunks: &[Chunk], terms: &[S]) -> Vec<RetrievalResult> {
    let terms = normalize_terms(terms);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<RetrievalResult> = chunks
        .iter()
        .filter_map(|chunk| {
            let lowered = chunk.text.to_lowercase();
            let term_counts: Vec<(String, usize)> = terms
                .iter()
                .filter_map(|term| {
                    let n = count_occurrences(&lowered, term);
                    (n > 0).then(|| (term.clone(), n))
                })
                .collect();
            let total: usize = term_counts.iter().map(|(_, n)| n).sum();
            (total > 0).then(|| RetrievalResult {
                chunk: chunk.clone(),
                score: total as f32,
                match_type: MatchType::Keyword,
                keyword_match: Some(KeywordMatch { term_counts, total }),
            })
        })
        .collect();

    results.sort_by(|a, b| {
        let ta = a.keyword_match.as_ref().map_or(0, |m| m.total);
        let tb = b.keyword_match.as_ref().map_or(0, |m| m.total);
        tb.cmp(&ta)
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkType;
    use pretty_assertions::assert_eq;

    fn chunk(text: &str) -> Chunk {
        Chunk::new(text.to_string(), ChunkType::Paragraph, 4)
    }

    #[test]
    fn test_counts_and_ordering() {
        let chunks = vec![
            chunk("The appeal was filed late."),
            chunk("Appeal denied. The APPEAL lacked merit and the remand was moot."),
            chunk("Nothing relevant here."),
        ];
        let results = keyword_search(&chunks, &["appeal", "Remand"]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, chunks[1].id);
        assert_eq!(results[0].score, 3.0);
        let detail = results[0].keyword_match.as_ref().unwrap();
        assert_eq!(
            detail.term_counts,
            vec![("appeal".to_string(), 2), ("remand".to_string(), 1)]
        );
        assert_eq!(results[1].match_type, MatchType::Keyword);
    }

    #[test]
    fn test_ties_keep_chunk_order() {
        let chunks = vec![chunk("Motion granted."), chunk("Motion denied.")];
        let results = keyword_search(&chunks, &["motion"]);
        assert_eq!(results[0].chunk.id, chunks[0].id);
        assert_eq!(results[1].chunk.id, chunks[1].id);
    }

    #[test]
    fn test_blank_and_duplicate_terms() {
        assert_eq!(normalize_terms(&["  Court ", "court", ""]), vec!["court"]);
        let chunks = vec![chunk("The court ruled.")];
        assert!(keyword_search::<&str>(&chunks, &[]).is_empty());
        assert_eq!(keyword_search(&chunks, &["COURT", "court"])[0].score, 1.0);
    }
}
