//! Header and footer detection for extracted court documents.
//!
//! Whole lines that look like running headers, footers or captions are
//! dropped. Citation and page fragments that extraction glued into the middle
//! of a line are cut out, then blank-line runs are collapsed.

use std::collections::HashSet;

use regex::{Captures, Regex};

/// Why a line was classified as a header or footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    CaseNumber,
    PageMarker,
    CourtBoilerplate,
    DateStamp,
    SectionTitle,
    AllCaps,
}

/// Lines at or above this length are never treated as all-caps headers.
pub const ALL_CAPS_MAX_CHARS: usize = 100;

lazy_static::lazy_static! {
    static ref LINE_RULES: Vec<(HeaderKind, Regex)> = vec![
        (
            HeaderKind::CaseNumber,
            Regex::new(r"(?i)^\s*(?:case\s+no\.?|no\.)\s*[:#]?\s*[\w-]*\d[\w-]*\s*$|^\s*\[?\d{4}-Ohio-\d+\]?\s*$|^\s*(?:Case\s+No\.?\s*)?\d{1,2}[A-Z]{1,4}\d{1,6}\s*$|^\s*\d{2,4}-[A-Z]{2,4}-\d{2,7}\s*$").unwrap(),
        ),
        (
            HeaderKind::PageMarker,
            Regex::new(r"(?i)^\s*(?:-\s*)?page\s+\d+(?:\s+of\s+\d+)?(?:\s*-)?\s*$|^\s*-?\s*\d{1,4}\s*-?\s*$").unwrap(),
        ),
        (
            HeaderKind::CourtBoilerplate,
            Regex::new(r"(?i)^\s*(?:in\s+the\s+)?(?:court\s+of\s+(?:common\s+pleas|appeals|claims)|supreme\s+court\s+of|united\s+states\s+(?:district|court)|(?:\w+\s+)?appellate\s+district|county\s+of\s+\w+)\b.*$").unwrap(),
        ),
        (
            HeaderKind::DateStamp,
            Regex::new(r"(?i)^\s*(?:date\s+of\s+)?(?:filed|decided|released|journalized|entered|judgment\s+entered)\b[:\s].*\d{4}\s*$").unwrap(),
        ),
        (
            HeaderKind::SectionTitle,
            Regex::new(r"(?i)^\s*(?:opinion|judgment\s+entry|decision(?:\s+and\s+(?:judgment\s+)?entry)?|journal\s+entry|background|analysis|conclusion|facts|procedural\s+history|law\s+and\s+analysis|assignments?\s+of\s+error|disposition)\s*:?\s*$").unwrap(),
        ),
    ];

    /// Mid-line fragments to excise, with their replacements.
    static ref INLINE_FRAGMENTS: Vec<(Regex, &'static str)> = vec![
        // `{¶ 12}` opens a numbered opinion paragraph
        (Regex::new(r"[ \t]*\{\s*¶+\s*\d+\s*\}[ \t]*").unwrap(), "\n\n"),
        (Regex::new(r"\s*\[Cite\s+as[^\]]*\]\s*").unwrap(), " "),
        (Regex::new(r"(?i)\s*\bpage\s+\d+\s+of\s+\d+\b\s*").unwrap(), " "),
    ];

    /// A bare number between two sentences.
    static ref NUMBER_BETWEEN_SENTENCES: Regex =
        Regex::new(r"([.!?][\x22\x27\u{201D}]?)\s+(\d{1,3})\s+([A-Z])").unwrap();

    static ref BLANK_RUN: Regex = Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").unwrap();
}

/// Classify a single line; `None` means the line is body text.
pub fn classify_line(line: &str) -> Option<HeaderKind> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    for (kind, rule) in LINE_RULES.iter() {
        if rule.is_match(trimmed) {
            return Some(*kind);
        }
    }
    if is_all_caps(trimmed) {
        return Some(HeaderKind::AllCaps);
    }
    None
}

/// Short line whose letters are all uppercase.
fn is_all_caps(line: &str) -> bool {
    if line.chars().count() >= ALL_CAPS_MAX_CHARS {
        return false;
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase())
}

/// Remove header lines and inline fragments, then collapse blank-line runs.
pub fn strip_headers(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let kept: Vec<&str> = normalized
        .lines()
        .map(|line| match classify_line(line) {
            Some(_) => "",
            None => line,
        })
        .collect();
    let mut cleaned = kept.join("\n");

    for (pattern, replacement) in INLINE_FRAGMENTS.iter() {
        cleaned = pattern.replace_all(&cleaned, *replacement).into_owned();
    }
    cleaned = excise_page_numbers(&cleaned);

    BLANK_RUN.replace_all(&cleaned, "\n\n").trim().to_string()
}

/// Cut bare numbers between sentences, but only those with a neighbouring
/// page number (n - 1 or n + 1) elsewhere in the text. A lone number is
/// more likely part of the prose.
fn excise_page_numbers(text: &str) -> String {
    let numbers: HashSet<u32> = NUMBER_BETWEEN_SENTENCES
        .captures_iter(text)
        .filter_map(|caps| caps[2].parse().ok())
        .collect();

    NUMBER_BETWEEN_SENTENCES
        .replace_all(text, |caps: &Captures| {
            let in_sequence = caps[2].parse::<u32>().map_or(false, |n| {
                numbers.contains(&(n + 1)) || n.checked_sub(1).map_or(false, |p| numbers.contains(&p))
            });
            if in_sequence {
                format!("{} {}", &caps[1], &caps[3])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}
