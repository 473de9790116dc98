//! Chunk boundary repair.
//!
//! Each stage is a pure function from text to text; `None` discards the
//! chunk. Stages run in order and the first discard stops the pipeline.

use regex::Regex;
use tracing::{debug, trace};

use super::sentence::{ends_with_terminator, is_closer, is_terminator, split_sentences};

/// Chunks shorter than this after repair are discarded.
pub const MIN_CHUNK_CHARS: usize = 20;

/// Per-chunk facts the stages need.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairContext {
    /// The first chunk of a document may start with anything
    pub is_first: bool,
}

impl RepairContext {
    pub fn first() -> Self {
        Self { is_first: true }
    }

    pub fn subsequent() -> Self {
        Self { is_first: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStage {
    Trim,
    Start,
    End,
    TrailingPhrase,
    DomainSuffix,
    IncompleteSentence,
    HeaderResidue,
    SizeFloor,
}

impl std::fmt::Display for RepairStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RepairStage::Trim => "trim",
            RepairStage::Start => "start",
            RepairStage::End => "end",
            RepairStage::TrailingPhrase => "trailing_phrase",
            RepairStage::DomainSuffix => "domain_suffix",
            RepairStage::IncompleteSentence => "incomplete_sentence",
            RepairStage::HeaderResidue => "header_residue",
            RepairStage::SizeFloor => "size_floor",
        };
        write!(f, "{}", name)
    }
}

/// Incomplete phrases that can trail a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingPhrase {
    DanglingTitle,
    DanglingPreposition,
    OpenBracket,
    IncompleteCitation,
}

type StageFn = fn(&str, &RepairContext) -> Option<String>;

lazy_static::lazy_static! {
    /// Each pattern marks where to truncate with a `cut` group.
    static ref TRAILING_PHRASES: Vec<(TrailingPhrase, Regex)> = vec![
        (
            TrailingPhrase::DanglingTitle,
            Regex::new(r"(?P<cut>\b(?:Mr|Mrs|Ms|Dr|Prof|Hon|Judge|Justice)\.?)\s*$").unwrap(),
        ),
        (
            TrailingPhrase::DanglingPreposition,
            Regex::new(r#"(?i)[^.\s](?P<cut>\s+(?:of|to|in|for|with|by|on|at|from|under|into|upon|about|between|against|per))\s*[.!?]?["'\u{201D})\]]*\s*$"#).unwrap(),
        ),
        (
            TrailingPhrase::OpenBracket,
            Regex::new(r"(?P<cut>[(\[][^)\]]*)$").unwrap(),
        ),
        (
            TrailingPhrase::IncompleteCitation,
            Regex::new(r"(?P<cut>\b(?:Id\.\s+at|Admin\.\s*R\.(?:\s+at)?|R\.C\.|\d+\s+Ohio(?:\s+(?:St|App)\.)?(?:\s*[23]d)?(?:\s+at)?))\s*[.!?]?\s*$").unwrap(),
        ),
    ];

    /// Extraction leftovers that are removed outright.
    static ref DOMAIN_SUFFIXES: Vec<Regex> = vec![
        Regex::new(r"\s*\{\s*¶+\s*\d+\s*\}[.,]?\s*$").unwrap(),
        Regex::new(r"\s*-\s*[Vv][Ss]?\.?\s*-[.,]?\s*$").unwrap(),
        Regex::new(r"\s*\[\s*\d{1,3}\s*\][.,]?\s*$").unwrap(),
        Regex::new(r"\s+(?:Relators?|Respondents?|Plaintiffs?|Defendants?|Appellants?|Appellees?)(?:-(?:Appellants?|Appellees?))?,\.?\s*$").unwrap(),
        Regex::new(r"\s+(?:JUDGMENT\s+ENTRY|DECISION|OPINION)[.,]?\s*$").unwrap(),
    ];

    /// A `{¶ N}` paragraph marker at the very start.
    static ref LEADING_MARKER: Regex = Regex::new(r"^\{\s*¶+\s*\d+\s*\}\s*").unwrap();

    static ref INCOMPLETE_ENDING: Regex = Regex::new(
        r#"(?i)\b(?:and|or|but|nor|of|to|in|for|with|by|on|at|from|the|a|an|that|because|whether)\s*[.!?]["'\u{201D})\]]*$"#
    ).unwrap();

    /// Words glued together by extraction, e.g. "deniedPage".
    static ref GLUED_WORDS: Regex = Regex::new(r"[a-z]{3}[A-Z][a-z]").unwrap();

    static ref HEADER_RESIDUE: Regex = Regex::new(
        r#"([.!?]["'\u{201D})\]]*)\s+(?:Case\s+No\.?\s*[\w-]+|No\.\s*\d[\w-]*|Page\s+\d+(?:\s+of\s+\d+)?|\[?\d{4}-Ohio-\d+\]?|State\s+ex\s+rel\.\s+[A-Z][\w.'&-]*(?:\s+[A-Z][\w.'&-]*)*\s+v\.\s+[A-Z][\w.'&-]*(?:\s+[A-Z][\w.'&-]*)*|[A-Z][A-Z.'&-]+(?:\s+[A-Z][A-Z.'&-]*)*\s+[Vv][Ss]?\.\s+[A-Z][A-Z.'&-]+(?:\s+[A-Z][A-Z.'&-]*)*)\s*\.?\s*$"#
    ).unwrap();
}

/// Prepositions that can close a sentence after a verb ("relied upon.",
/// "was acted on.").
const VERB_PARTICLES: &[&str] = &[
    "upon", "on", "in", "to", "for", "with", "by", "at", "from", "into", "about", "under", "against",
];

const CONNECTORS: &[&str] = &[
    "and", "or", "but", "nor", "of", "to", "in", "for", "with", "by", "on", "at", "from", "the",
    "a", "an", "see", "that",
];

/// Repair stages in order.
pub const REPAIR_STAGES: &[(RepairStage, StageFn)] = &[
    (RepairStage::Trim, trim),
    (RepairStage::Start, repair_start),
    (RepairStage::End, repair_end),
    (RepairStage::TrailingPhrase, trim_trailing_phrase),
    (RepairStage::DomainSuffix, strip_domain_suffixes),
    (RepairStage::IncompleteSentence, drop_incomplete_sentence),
    (RepairStage::HeaderResidue, strip_header_residue),
    (RepairStage::SizeFloor, size_floor),
];

/// Run every stage over `text`. Returns `None` when a stage discards it.
pub fn repair(text: &str, ctx: &RepairContext) -> Option<String> {
    let mut current = text.to_string();
    for (stage, apply) in REPAIR_STAGES {
        match apply(&current, ctx) {
            Some(next) => current = next,
            None => {
                debug!(stage = %stage, chars = current.chars().count(), "Chunk discarded during boundary repair");
                return None;
            }
        }
    }
    Some(current)
}

fn starts_well(text: &str) -> bool {
    text.chars()
        .next()
        .map_or(false, |c| c.is_uppercase() || c.is_ascii_digit())
}

/// Trim whitespace and a leading paragraph marker.
pub fn trim(text: &str, _: &RepairContext) -> Option<String> {
    let trimmed = text.trim();
    let trimmed = LEADING_MARKER.replace(trimmed, "");
    (!trimmed.is_empty()).then(|| trimmed.into_owned())
}

/// Start at an uppercase letter or digit, skipping a leading partial
/// sentence when needed.
pub fn repair_start(text: &str, ctx: &RepairContext) -> Option<String> {
    if ctx.is_first || starts_well(text) {
        return Some(text.to_string());
    }
    split_sentences(text)
        .into_iter()
        .skip(1)
        .find(|s| starts_well(&s.text))
        .map(|s| text.chars().skip(s.start).collect())
}

/// End with a terminator: cut back to the last sentence end when it lies past
/// the midpoint, otherwise close the text with a period.
pub fn repair_end(text: &str, _: &RepairContext) -> Option<String> {
    let text = text.trim_end();
    if text.is_empty() {
        return None;
    }
    if ends_with_terminator(text) {
        return Some(text.to_string());
    }

    let sentences = split_sentences(text);
    if sentences.len() > 1 {
        let cut = sentences[sentences.len() - 2].end;
        if cut > text.chars().count() / 2 {
            return Some(text.chars().take(cut).collect());
        }
    }

    let body = text.trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '\u{2013}' | '\u{2014}')
    });
    if body.is_empty() {
        return None;
    }
    Some(format!("{}.", body))
}

fn strip_connectors(text: &str) -> &str {
    let mut current = text;
    loop {
        let trimmed = current.trim_end_matches(|c: char| {
            c.is_whitespace()
                || matches!(c, ',' | ';' | ':' | '-' | '(' | '[' | '\u{2013}' | '\u{2014}')
        });
        let word_start = trimmed
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map_or(0, |(i, c)| i + c.len_utf8());
        let last_word = trimmed[word_start..].to_lowercase();
        if !trimmed.is_empty() && CONNECTORS.contains(&last_word.as_str()) {
            current = &trimmed[..word_start];
        } else {
            return trimmed;
        }
    }
}

/// A closed sentence ending on a verb and its particle, e.g. "relied upon.".
fn ends_with_verb_particle(text: &str, cut_start: usize) -> bool {
    if !ends_with_terminator(text) {
        return false;
    }
    let particle = text[cut_start..]
        .trim()
        .trim_end_matches(|c: char| is_terminator(c) || is_closer(c))
        .to_lowercase();
    let verb = text[..cut_start]
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .to_lowercase();
    VERB_PARTICLES.contains(&particle.as_str())
        && (verb.ends_with("ed") || verb.ends_with("ing") || verb.ends_with("en"))
}

/// Truncate an incomplete trailing phrase and close the sentence again.
pub fn trim_trailing_phrase(text: &str, ctx: &RepairContext) -> Option<String> {
    for (phrase, pattern) in TRAILING_PHRASES.iter() {
        if let Some(caps) = pattern.captures(text) {
            let cut = caps.name("cut").or_else(|| caps.get(0))?;
            if *phrase == TrailingPhrase::DanglingPreposition && ends_with_verb_particle(text, cut.start()) {
                continue;
            }
            trace!(?phrase, "Truncating trailing phrase");
            let head = strip_connectors(&text[..cut.start()]);
            if head.is_empty() {
                return None;
            }
            return repair_end(head, ctx);
        }
    }
    Some(text.to_string())
}

/// Remove fixed extraction leftovers from the end of the text.
pub fn strip_domain_suffixes(text: &str, _: &RepairContext) -> Option<String> {
    let mut current = text.to_string();
    loop {
        let before = current.len();
        for pattern in DOMAIN_SUFFIXES.iter() {
            current = pattern.replace(&current, "").into_owned();
        }
        if current.len() == before {
            break;
        }
    }
    let trimmed = current.trim_end();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Drop a final sentence that ends on a function word or carries glued
/// words, as long as another sentence remains.
pub fn drop_incomplete_sentence(text: &str, _: &RepairContext) -> Option<String> {
    let sentences = split_sentences(text);
    if sentences.len() < 2 {
        return Some(text.to_string());
    }
    let last = &sentences[sentences.len() - 1];
    let tail: String = {
        let chars: Vec<char> = last.text.chars().collect();
        chars[chars.len().saturating_sub(30)..].iter().collect()
    };
    if INCOMPLETE_ENDING.is_match(&last.text) || GLUED_WORDS.is_match(&tail) {
        let head: String = text.chars().take(last.start).collect();
        return Some(head.trim_end().to_string());
    }
    Some(text.to_string())
}

/// Strip case numbers, page markers and captions trailing the last sentence.
pub fn strip_header_residue(text: &str, ctx: &RepairContext) -> Option<String> {
    let stripped = HEADER_RESIDUE.replace(text, "$1");
    repair_end(&stripped, ctx)
}

pub fn size_floor(text: &str, _: &RepairContext) -> Option<String> {
    (text.chars().count() >= MIN_CHUNK_CHARS).then(|| text.to_string())
}
