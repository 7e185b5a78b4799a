//! Non-answer detection.

/// Answers at least this long are treated as substantive even if they mention
/// missing information.
pub const SHORT_ANSWER_CHARS: usize = 150;

/// Phrases signalling that the generator found nothing. Matched
/// case-insensitively as substrings.
pub const NON_ANSWER_PHRASES: &[&str] = &[
    "i don't have",
    "not mentioned",
    "not specified",
    "not provided",
    "not contain",
    "no information",
    "cannot find",
    "not found",
    "not available",
    "context does not",
    "not in the context",
];

pub fn is_empty(answer: &str) -> bool {
    if answer.chars().count() >= SHORT_ANSWER_CHARS {
        return false;
    }
    let lower = answer.to_lowercase();
    NON_ANSWER_PHRASES.iter().any(|p| lower.contains(p))
}
