//! Abbreviation table used by the sentence boundary classifier.

use std::collections::HashMap;

/// How an abbreviation behaves before a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbbrevKind {
    /// Precedes a name or number ("Dr.", "v.", "No."); never ends a sentence.
    Prefix,
    /// May end a sentence ("etc.", "Inc."); a boundary only before an
    /// uppercase letter.
    Terminal,
}

const PREFIXES: &[&str] = &[
    // Titles
    "mr", "mrs", "ms", "dr", "prof", "hon", "rev", "sgt", "capt", "gen", "lt", "col", "gov",
    "sen", "rep", "pres", "messrs",
    // Reference prefixes
    "v", "vs", "sec", "secs", "art", "arts", "para", "paras", "fig", "ch", "vol", "pp", "cf",
];

const TERMINALS: &[&str] = &[
    // General; "St." may be Street at the end of a sentence
    "etc", "st", "ave", "blvd", "al", "approx", "dept", "est", "misc", "no", "nos",
    // Latin
    "i.e", "e.g", "viz", "ibid", "id",
    // Corporate suffixes
    "inc", "corp", "co", "ltd", "llc", "llp", "bros", "assn",
    // Name suffixes and degrees
    "jr", "sr", "esq", "ph.d", "m.d", "j.d", "b.a", "m.a", "ll.m",
    // Months
    "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
    // Legal citation tokens
    "admin", "app", "supp", "ct", "cir", "dist", "ed", "rev", "stat", "ann", "tr", "br",
    "op", "ohio", "misc", "jud", "prac", "proc", "civ", "crim", "evid",
];

lazy_static::lazy_static! {
    static ref TABLE: HashMap<&'static str, AbbrevKind> = {
        let mut table = HashMap::new();
        for word in TERMINALS {
            table.insert(*word, AbbrevKind::Terminal);
        }
        // Prefixes win where a word appears in both lists
        for word in PREFIXES {
            table.insert(*word, AbbrevKind::Prefix);
        }
        table
    };
}

/// Look up the word before a period (without the final period), case-insensitively.
pub fn lookup(word: &str) -> Option<AbbrevKind> {
    if word.is_empty() {
        return None;
    }
    let lowered = word.to_lowercase();
    TABLE.get(lowered.trim_end_matches('.')).copied()
}

/// Whether `word` is a title that normally precedes a name.
pub fn is_title(word: &str) -> bool {
    matches!(
        word.to_lowercase().as_str(),
        "mr" | "mrs" | "ms" | "dr" | "prof" | "hon" | "rev" | "judge" | "justice"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles_are_prefixes() {
        assert_eq!(lookup("Dr"), Some(AbbrevKind::Prefix));
        assert_eq!(lookup("MRS"), Some(AbbrevKind::Prefix));
        assert_eq!(lookup("v"), Some(AbbrevKind::Prefix));
    }

    #[test]
    fn test_terminals() {
        assert_eq!(lookup("etc"), Some(AbbrevKind::Terminal));
        assert_eq!(lookup("Inc"), Some(AbbrevKind::Terminal));
        assert_eq!(lookup("i.e"), Some(AbbrevKind::Terminal));
        assert_eq!(lookup("Ph.D"), Some(AbbrevKind::Terminal));
        assert_eq!(lookup("St"), Some(AbbrevKind::Terminal));
    }

    #[test]
    fn test_prefix_wins_over_terminal() {
        // "rev" is both a title and a citation token
        assert_eq!(lookup("Rev"), Some(AbbrevKind::Prefix));
    }

    #[test]
    fn test_unknown_words() {
        assert_eq!(lookup("motion"), None);
        assert_eq!(lookup(""), None);
        assert!(is_title("Judge"));
        assert!(!is_title("court"));
    }
}
