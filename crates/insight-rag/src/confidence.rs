//! Explainable confidence for generated answers.
//!
//! Starts from a base score; each signal adds or subtracts points and
//! contributes a reason. The uncertainty cap and the final clamp apply after
//! all signals.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::lexicon::{self, capitalize_first};

pub const BASE_SCORE: i32 = 60;
pub const MIN_SCORE: i32 = 35;
pub const MAX_SCORE: i32 = 95;
pub const UNCERTAIN_CAP: i32 = 55;
/// Fixed score of a low-relevance response; it bypasses the estimator.
pub const LOW_RELEVANCE_SCORE: u8 = 30;

const GENERIC_PHRASES: &[&str] = &["the context", "the document", "it states", "according to", "as mentioned"];
const UNCERTAIN_PHRASES: &[&str] = &["not contain", "does not specify", "unclear", "not mentioned", "not provided", "no information"];
const TRUNCATION_MARKERS: &[&str] = &["...", "etc", "and more"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfidenceSignal {
    pub score: u8,
    pub reason: String,
}

/// Points and reasons collected while scoring.
#[derive(Debug, Default)]
struct Tally {
    points: i32,
    reasons: Vec<&'static str>,
}

impl Tally {
    fn add(&mut self, points: i32, reason: &'static str) {
        self.points += points;
        self.reasons.push(reason);
    }
}

fn overlap(of: &BTreeSet<String>, within: &BTreeSet<String>) -> f32 {
    if of.is_empty() {
        return 0.0;
    }
    of.intersection(within).count() as f32 / of.len() as f32
}

fn grounding(tally: &mut Tally, answer_words: &BTreeSet<String>, context_words: &BTreeSet<String>) {
    let ratio = overlap(answer_words, context_words);
    if ratio > 0.5 {
        tally.add(20, "strongly grounded in retrieved context");
    } else if ratio > 0.3 {
        tally.add(10, "moderately grounded in retrieved context");
    } else if ratio > 0.15 {
        tally.add(5, "weakly grounded in retrieved context");
    } else {
        tally.add(-10, "limited context grounding");
    }
}

fn query_coverage(tally: &mut Tally, query: &str, answer_words: &BTreeSet<String>) {
    let query_words: BTreeSet<String> = lexicon::words(query).filter(|w| !lexicon::is_stopword(w)).collect();
    let ratio = overlap(&query_words, answer_words);
    if ratio > 0.6 {
        tally.add(10, "directly addresses query");
    } else if ratio > 0.3 {
        tally.add(5, "partially addresses query");
    } else {
        tally.add(-5, "may not fully address query");
    }
}

fn generic_phrasing(tally: &mut Tally, answer_lower: &str) {
    if GENERIC_PHRASES.iter().filter(|p| answer_lower.contains(*p)).count() > 2 {
        tally.add(-10, "generic phrasing");
    }
}

fn completeness(tally: &mut Tally, query: &str, answer: &str) {
    let query_words = query.split_whitespace().count();
    let answer_len = answer.chars().count();
    if query_words > 10 && answer_len > 200 {
        tally.add(10, "detailed answer for complex query");
    } else if query_words > 10 && answer_len < 100 {
        tally.add(-15, "brief answer for complex query");
    } else if query_words <= 5 && answer_len > 150 {
        tally.add(5, "thorough answer for simple query");
    }
}

fn context_richness(tally: &mut Tally, context: &str) {
    let len = context.chars().count();
    if len > 1500 {
        tally.add(8, "rich supporting context");
    } else if len > 800 {
        tally.add(4, "substantial supporting context");
    } else if len < 300 {
        tally.add(-5, "limited supporting context");
    }
}

fn truncation(tally: &mut Tally, answer: &str) {
    let trimmed = answer.trim_end();
    let bare = trimmed.trim_end_matches('.');
    if trimmed.ends_with("...") || TRUNCATION_MARKERS.iter().any(|m| bare.ends_with(m)) {
        tally.add(-5, "answer appears truncated");
    }
}

/// Scores how well `answer` is supported by `context` and addresses `query`.
pub fn estimate(query: &str, context: &str, answer: &str) -> ConfidenceSignal {
    let answer_lower = answer.to_lowercase();
    let answer_words = lexicon::word_set(answer);
    let context_words = lexicon::word_set(context);

    let uncertain = UNCERTAIN_PHRASES.iter().any(|p| answer_lower.contains(p));
    let mut tally = Tally { points: BASE_SCORE, reasons: Vec::new() };
    if uncertain {
        tally.reasons.push("information not found in context");
    }
    grounding(&mut tally, &answer_words, &context_words);
    query_coverage(&mut tally, query, &answer_words);
    generic_phrasing(&mut tally, &answer_lower);
    completeness(&mut tally, query, answer);
    context_richness(&mut tally, context);
    truncation(&mut tally, answer);

    let mut score = tally.points;
    if uncertain {
        score = score.min(UNCERTAIN_CAP);
    }
    let score = score.clamp(MIN_SCORE, MAX_SCORE) as u8;
    ConfidenceSignal { score, reason: format_reason(&tally.reasons) }
}

/// First reason capitalised, then up to two more in parentheses.
pub fn format_reason(reasons: &[&str]) -> String {
    match reasons {
        [] => "Based on clause analysis".to_string(),
        [first] => capitalize_first(first),
        [first, rest @ ..] => {
            let extra: Vec<&str> = rest.iter().take(2).copied().collect();
            format!("{} ({})", capitalize_first(first), extra.join(", "))
        }
    }
}
