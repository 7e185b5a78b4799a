//! Word-level helpers shared by the heuristics.

use std::collections::{BTreeSet, HashSet};

pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from", "is", "are",
    "was", "were", "what", "how", "when", "where", "which", "who", "about", "this", "that", "these", "those", "can",
    "be", "do", "does", "it", "its", "if", "my", "i", "we", "our", "you", "your", "there", "any", "will", "would",
    "should", "could", "has", "have", "as",
];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Lower-cased whitespace tokens with surrounding punctuation removed.
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
}

pub fn word_set(text: &str) -> BTreeSet<String> {
    words(text).collect()
}

/// Keeps the first occurrence of every item, comparing trimmed lower-case
/// forms. Blank items are dropped.
pub fn dedup_case_insensitive<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let item = item.into();
        let key = item.trim().to_lowercase();
        if !key.is_empty() && seen.insert(key) {
            out.push(item);
        }
    }
    out
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Upper-cases the first letter of every word and lower-cases the rest.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_seen_spelling() {
        assert_eq!(dedup_case_insensitive(["Notice", "notice", "NOTICE"]), vec!["Notice"]);
        assert_eq!(dedup_case_insensitive(["b", " ", "A", "a ", "B"]), vec!["b", "A"]);
    }

    #[test]
    fn words_strip_punctuation() {
        let w: Vec<String> = words("Terminated? (30 days) notice.").collect();
        assert_eq!(w, vec!["terminated", "30", "days", "notice"]);
    }

    #[test]
    fn title_case_matches_heading_style() {
        assert_eq!(title_case("GOVERNING  LAW"), "Governing Law");
        assert_eq!(title_case("termination"), "Termination");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
