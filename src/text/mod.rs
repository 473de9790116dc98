//! Rule-based text analysis for extracted documents.
//!
//! - `header`: drops running headers and footers
//! - `paragraph`: splits paragraphs and merges fragments
//! - `sentence`: sentence boundaries
//! - `repair`: fixes chunk starts and ends

pub mod abbreviations;
pub mod header;
pub mod paragraph;
pub mod repair;
pub mod sentence;

pub use header::{classify_line, strip_headers, HeaderKind};
pub use paragraph::{
    fragment_reason, is_fragment, merge_fragments, split_paragraphs, FragmentReason,
    MergedParagraph,
};
pub use repair::{repair, RepairContext, RepairStage, MIN_CHUNK_CHARS};
pub use sentence::{classify_boundary, ends_with_terminator, split_sentences, Sentence};

/// Strip headers, split into paragraphs and merge fragments.
pub fn prepare_paragraphs(text: &str, min_paragraph_chars: usize) -> Vec<MergedParagraph> {
    let cleaned = strip_headers(text);
    let paragraphs = split_paragraphs(&cleaned);
    merge_fragments(&paragraphs, min_paragraph_chars)
}
