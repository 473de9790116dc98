//! Retrieval result and keyword types.

use serde::{Deserialize, Serialize};

use super::Chunk;

/// How a retrieval result was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Semantic,
    Keyword,
}

/// Which keyword terms matched a chunk and how often.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordMatch {
    /// Terms in query order, with their occurrence counts
    pub term_counts: Vec<(String, usize)>,

    /// Sum of all counts
    pub total: usize,
}

impl KeywordMatch {
    /// The terms that matched.
    pub fn matched_terms(&self) -> Vec<&str> {
        self.term_counts.iter().map(|(t, _)| t.as_str()).collect()
    }
}

/// A chunk returned by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub chunk: Chunk,

    /// Cosine similarity (semantic) or total occurrence count (keyword)
    pub score: f32,

    pub match_type: MatchType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_match: Option<KeywordMatch>,
}

/// One extracted keyword and its variations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub term: String,
    #[serde(default)]
    pub variations: Vec<String>,
}

/// Output of the keyword-extraction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordExtraction {
    pub keywords: Vec<KeywordEntry>,
}

impl KeywordExtraction {
    /// Flatten terms and variations into a lower-cased set, first occurrence
    /// order preserved.
    pub fn flatten(&self) -> Vec<String> {
        let raw: Vec<&str> = self
            .keywords
            .iter()
            .flat_map(|entry| std::iter::once(&entry.term).chain(entry.variations.iter()))
            .map(String::as_str)
            .collect();
        normalize_terms(&raw)
    }
}

/// Lower-case, trim and de-duplicate terms, keeping first-occurrence order.
pub fn normalize_terms<S: AsRef<str>>(terms: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for term in terms {
        let term = term.as_ref().trim().to_lowercase();
        if !term.is_empty() && !out.contains(&term) {
            out.push(term);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_dedups_and_lowercases() {
        let extraction = KeywordExtraction {
            keywords: vec![
                KeywordEntry {
                    term: "Negligence".to_string(),
                    variations: vec!["negligent".to_string(), "NEGLIGENCE".to_string()],
                },
                KeywordEntry {
                    term: "  ".to_string(),
                    variations: vec!["duty of care".to_string()],
                },
            ],
        };
        assert_eq!(
            extraction.flatten(),
            vec!["negligence", "negligent", "duty of care"]
        );
        assert_eq!(
            extraction.flatten(),
            normalize_terms(&["Negligence", "negligent", "NEGLIGENCE", "  ", "duty of care"])
        );
    }

    #[test]
    fn test_matched_terms() {
        let m = KeywordMatch {
            term_counts: vec![("appeal".into(), 2), ("remand".into(), 1)],
            total: 3,
        };
        assert_eq!(m.matched_terms(), vec!["appeal", "remand"]);
    }
}
