//! Sentence boundary classification and sentence splitting.
//!
//! A terminator (`.`, `!`, `?`) is a sentence boundary only when the rule
//! table says so. Rules are evaluated in order and the first one that returns
//! a decision wins, so each rule can be tested on its own.

use regex::Regex;

use super::abbreviations::{self, AbbrevKind};

lazy_static::lazy_static! {
    /// Multi-token citation forms whose periods never end a sentence.
    static ref LEGAL_CITATION: Regex = Regex::new(
        r"\b(?:Admin\.\s*R\.|Admin\.\s*Code|U\.\s*S\.\s*C\.|U\.\s*S\.|N\.\s*E\.(?:\s*[23]d)?|N\.\s*W\.(?:\s*[23]d)?|S\.\s*W\.(?:\s*[23]d)?|S\.\s*E\.(?:\s*[23]d)?|S\.\s*Ct\.|F\.\s*Supp\.(?:\s*[23]d)?|F\.\s*(?:2d|3d|4th)|L\.\s*Ed\.(?:\s*2d)?|A\.\s*[23]d|P\.\s*[23]d|So\.\s*[23]d|Ohio\s+St\.(?:\s*[23]d)?|Ohio\s+App\.(?:\s*[23]d)?|Ohio\s+Misc\.(?:\s*2d)?|R\.\s*C\.)"
    ).unwrap();
}

/// Characters that may close a sentence after its terminator.
pub fn is_closer(c: char) -> bool {
    matches!(c, ')' | ']' | '"' | '\'' | '\u{201D}' | '\u{2019}' | '\u{00BB}')
}

/// Sentence terminators.
pub fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Whether `text` ends with a terminator, optionally followed by closers.
pub fn ends_with_terminator(text: &str) -> bool {
    text.trim_end()
        .trim_end_matches(is_closer)
        .chars()
        .last()
        .map_or(false, is_terminator)
}

/// The rule that decided a boundary question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryRule {
    EndOfInput,
    ClosingThenUpper,
    NoWhitespace,
    LowercaseFollows,
    LegalCitation,
    Abbreviation,
    Initial,
    Default,
}

/// Outcome of classifying one terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryDecision {
    pub rule: BoundaryRule,
    pub is_boundary: bool,
}

/// A terminator position within a character buffer.
pub struct BoundaryContext<'a> {
    chars: &'a [char],
    pos: usize,
}

impl<'a> BoundaryContext<'a> {
    pub fn new(chars: &'a [char], pos: usize) -> Self {
        Self { chars, pos }
    }

    fn after(&self) -> &[char] {
        &self.chars[(self.pos + 1).min(self.chars.len())..]
    }

    fn next_char(&self) -> Option<char> {
        self.after().first().copied()
    }

    fn next_non_space(&self) -> Option<char> {
        self.after().iter().copied().find(|c| !c.is_whitespace())
    }

    /// Word before the terminator, including internal periods ("i.e", "Ph.D").
    fn preceding_word(&self) -> String {
        let mut start = self.pos;
        while start > 0 {
            let c = self.chars[start - 1];
            if c.is_alphanumeric() || c == '.' {
                start -= 1;
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        word.trim_start_matches('.').to_string()
    }

    fn in_legal_citation(&self) -> bool {
        const REACH: usize = 24;
        let lo = self.pos.saturating_sub(REACH);
        let hi = (self.pos + REACH).min(self.chars.len());
        let window: String = self.chars[lo..hi].iter().collect();
        let pos_in_window = self.pos - lo;
        LEGAL_CITATION.find_iter(&window).any(|m| {
            let start = window[..m.start()].chars().count();
            let end = start + m.as_str().chars().count();
            (start..end).contains(&pos_in_window)
        })
    }
}

type BoundaryRuleFn = fn(&BoundaryContext) -> Option<bool>;

fn end_of_input(ctx: &BoundaryContext) -> Option<bool> {
    ctx.after().iter().all(|c| c.is_whitespace()).then_some(true)
}

fn closing_then_upper(ctx: &BoundaryContext) -> Option<bool> {
    if !ctx.next_char().map_or(false, is_closer) {
        return None;
    }
    let next = ctx
        .after()
        .iter()
        .copied()
        .find(|c| !is_closer(*c) && !c.is_whitespace());
    match next {
        None => Some(true),
        Some(c) if c.is_uppercase() => Some(true),
        Some(_) => None,
    }
}

fn no_whitespace(ctx: &BoundaryContext) -> Option<bool> {
    ctx.next_char()
        .map_or(false, |c| !c.is_whitespace())
        .then_some(false)
}

fn lowercase_follows(ctx: &BoundaryContext) -> Option<bool> {
    ctx.next_non_space()
        .map_or(false, |c| c.is_lowercase())
        .then_some(false)
}

fn legal_citation(ctx: &BoundaryContext) -> Option<bool> {
    ctx.in_legal_citation().then_some(false)
}

fn abbreviation(ctx: &BoundaryContext) -> Option<bool> {
    match abbreviations::lookup(&ctx.preceding_word())? {
        AbbrevKind::Prefix => Some(false),
        AbbrevKind::Terminal => Some(ctx.next_non_space().map_or(true, |c| c.is_uppercase())),
    }
}

fn initial(ctx: &BoundaryContext) -> Option<bool> {
    let word = ctx.preceding_word();
    let mut chars = word.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_uppercase() => {
            Some(ctx.next_non_space().map_or(true, |n| n.is_uppercase()))
        }
        _ => None,
    }
}

fn default_rule(ctx: &BoundaryContext) -> Option<bool> {
    let upper_or_digit = ctx
        .next_non_space()
        .map_or(true, |c| c.is_uppercase() || c.is_ascii_digit());
    let whitespace_follows = ctx.next_char().map_or(true, char::is_whitespace);
    Some(upper_or_digit || whitespace_follows)
}

/// Boundary rules in evaluation order.
///
/// The citation rule runs before the abbreviation and initial rules: "U. S."
/// would otherwise be decided by the initial rule at its first period.
pub const BOUNDARY_RULES: &[(BoundaryRule, BoundaryRuleFn)] = &[
    (BoundaryRule::EndOfInput, end_of_input),
    (BoundaryRule::ClosingThenUpper, closing_then_upper),
    (BoundaryRule::NoWhitespace, no_whitespace),
    (BoundaryRule::LowercaseFollows, lowercase_follows),
    (BoundaryRule::LegalCitation, legal_citation),
    (BoundaryRule::Abbreviation, abbreviation),
    (BoundaryRule::Initial, initial),
    (BoundaryRule::Default, default_rule),
];

/// Decide whether the terminator at `pos` ends a sentence.
pub fn classify_boundary(chars: &[char], pos: usize) -> BoundaryDecision {
    let ctx = BoundaryContext::new(chars, pos);
    for (rule, check) in BOUNDARY_RULES {
        if let Some(is_boundary) = check(&ctx) {
            return BoundaryDecision {
                rule: *rule,
                is_boundary,
            };
        }
    }
    BoundaryDecision {
        rule: BoundaryRule::Default,
        is_boundary: true,
    }
}

/// A sentence with its character range in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    /// Start character offset (inclusive)
    pub start: usize,
    /// End character offset (exclusive)
    pub end: usize,
}

/// Split text into sentences.
pub fn split_sentences(text: &str) -> Vec<Sentence> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if is_terminator(chars[i]) && classify_boundary(&chars, i).is_boundary {
            let mut end = i + 1;
            while end < chars.len() && is_closer(chars[end]) {
                end += 1;
            }
            push_trimmed(&chars, start, end, &mut sentences);
            start = end;
            i = end;
            continue;
        }
        i += 1;
    }
    push_trimmed(&chars, start, chars.len(), &mut sentences);

    sentences
}

fn push_trimmed(chars: &[char], mut start: usize, mut end: usize, out: &mut Vec<Sentence>) {
    while start < end && chars[start].is_whitespace() {
        start += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    if start < end {
        out.push(Sentence {
            text: chars[start..end].iter().collect(),
            start,
            end,
        });
    }
}
