//! Retrieval over embedded chunks.
//!
//! Semantic ranking suppresses near duplicates before scoring. Keyword
//! matches are literal and case-insensitive. Hybrid retrieval lists semantic
//! hits first and appends keyword hits not already present.

mod engine;
mod hybrid;
mod keyword;
mod semantic;
mod similarity;

pub use engine::{AnswerGenerator, KeywordExtractor, QueryEngine, QueryOutcome, DEFAULT_SYSTEM_PROMPT};
pub use hybrid::{build_context, merge_hybrid};
pub use keyword::{keyword_search, normalize_terms};
pub use semantic::{dedup_by_similarity, semantic_search, validate_top_k};
pub use similarity::cosine_similarity;
