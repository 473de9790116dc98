//! Paragraph segmentation and fragment merging.
//!
//! Extraction often breaks one paragraph into several pieces: a page break in
//! the middle of a sentence, a citation wrapped onto the next line, a dangling
//! ellipsis. Pieces that look incomplete are merged forward into the next
//! paragraph until the merged text reads as a whole.

use std::ops::Range;

use regex::Regex;
use tracing::trace;

use super::sentence::ends_with_terminator;

lazy_static::lazy_static! {
    static ref BLANK_LINE: Regex = Regex::new(r"\n[ \t]*\n").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref LIST_ITEM: Regex =
        Regex::new(r"^(?:\(?\d{1,3}[.)]|\(?[a-z][.)]|\(?[ivxlc]+[.)]|[•*-])\s").unwrap();
    static ref OPEN_CITATION: Regex =
        Regex::new(r"(?:\(\s*Admin\.\s*R\.(?:\s+at)?|\bId\.\s+at)\s*$").unwrap();
    static ref SPACED_ELLIPSIS: Regex = Regex::new(r"\.\s+\.(?:\s*\.)?").unwrap();
    static ref TRAILING_ELLIPSIS: Regex = Regex::new(r"\.\s+\.(?:\s*\.)?\s*$").unwrap();
}

/// Why a paragraph was judged incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentReason {
    /// Short and not a capitalized, terminated sentence
    TooShort,
    /// Starts with a lowercase letter or continuation punctuation
    DanglingStart,
    /// No terminator at the end, and not a list item
    MissingTerminator,
    /// Ends inside a citation such as "(Admin. R. at"
    OpenCitation,
    /// Contains a spaced ellipsis left by extraction
    SpacedEllipsis,
    /// Ends after an unclosed bracket
    OpenBracket,
}

type FragmentRule = fn(&str, usize) -> bool;

fn too_short(text: &str, min_chars: usize) -> bool {
    text.chars().count() < min_chars && !is_well_formed_sentence(text)
}

fn dangling_start(text: &str, _: usize) -> bool {
    text.chars()
        .next()
        .map_or(false, |c| c.is_lowercase() || matches!(c, ',' | ';' | ':' | ')' | ']' | '.' | '\u{2026}'))
}

fn missing_terminator(text: &str, _: usize) -> bool {
    !ends_with_terminator(text) && !LIST_ITEM.is_match(text)
}

fn open_citation(text: &str, _: usize) -> bool {
    OPEN_CITATION.is_match(text)
}

fn spaced_ellipsis(text: &str, _: usize) -> bool {
    SPACED_ELLIPSIS.is_match(text)
}

fn open_bracket(text: &str, _: usize) -> bool {
    let last_open = text.rfind(|c| c == '(' || c == '[');
    let last_close = text.rfind(|c| c == ')' || c == ']');
    match (last_open, last_close) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Fragment rules in evaluation order.
pub const FRAGMENT_RULES: &[(FragmentReason, FragmentRule)] = &[
    (FragmentReason::TooShort, too_short),
    (FragmentReason::DanglingStart, dangling_start),
    (FragmentReason::MissingTerminator, missing_terminator),
    (FragmentReason::OpenCitation, open_citation),
    (FragmentReason::SpacedEllipsis, spaced_ellipsis),
    (FragmentReason::OpenBracket, open_bracket),
];

fn is_well_formed_sentence(text: &str) -> bool {
    text.chars().next().map_or(false, char::is_uppercase) && ends_with_terminator(text)
}

/// First fragment rule that matches `text`, if any.
pub fn fragment_reason(text: &str, min_chars: usize) -> Option<FragmentReason> {
    FRAGMENT_RULES
        .iter()
        .find(|(_, rule)| rule(text, min_chars))
        .map(|(reason, _)| *reason)
}

pub fn is_fragment(text: &str, min_chars: usize) -> bool {
    fragment_reason(text, min_chars).is_some()
}

/// Whether merged text is still incomplete at its end. A lowercase start
/// never keeps a merge going.
fn tail_incomplete(text: &str, min_chars: usize) -> bool {
    if too_short(text, min_chars)
        || missing_terminator(text, min_chars)
        || open_citation(text, min_chars)
        || open_bracket(text, min_chars)
    {
        return true;
    }
    TRAILING_ELLIPSIS.is_match(text)
}

/// Split cleaned text into paragraphs on blank lines, collapsing internal
/// whitespace and dropping empty paragraphs.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    BLANK_LINE
        .split(&normalized)
        .map(|p| WHITESPACE.replace_all(p.trim(), " ").into_owned())
        .filter(|p| !p.is_empty())
        .collect()
}

/// A paragraph after fragment merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedParagraph {
    pub text: String,
    /// Indices of the input paragraphs it was built from (end exclusive)
    pub source_range: Range<usize>,
}

impl MergedParagraph {
    /// Whether more than one input paragraph went into this one.
    pub fn was_merged(&self) -> bool {
        self.source_range.len() > 1
    }
}

/// Merge fragments forward into their successors.
///
/// A fragment absorbs the next paragraph, then keeps absorbing while the
/// merged text is still incomplete at its end and input remains. Each step
/// consumes at least one paragraph, so the pass is linear in the input.
pub fn merge_fragments(paragraphs: &[String], min_chars: usize) -> Vec<MergedParagraph> {
    let mut merged = Vec::new();
    let mut i = 0;

    while i < paragraphs.len() {
        let start = i;
        let mut text = paragraphs[i].clone();
        i += 1;

        if let Some(reason) = fragment_reason(&text, min_chars) {
            trace!(paragraph = start, ?reason, "Merging fragment forward");
            if i < paragraphs.len() {
                text = join(&text, &paragraphs[i]);
                i += 1;
            }
            while i < paragraphs.len() && tail_incomplete(&text, min_chars) {
                text = join(&text, &paragraphs[i]);
                i += 1;
            }
        }

        merged.push(MergedParagraph {
            text,
            source_range: start..i,
        });
    }

    merged
}

fn join(head: &str, tail: &str) -> String {
    let mut joined = String::with_capacity(head.len() + tail.len() + 1);
    joined.push_str(head.trim_end());
    joined.push(' ');
    joined.push_str(tail.trim_start());
    joined
}
