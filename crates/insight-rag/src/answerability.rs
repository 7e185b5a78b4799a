//! Query-type heuristics estimating how likely a chunk is to hold the answer.
//!
//! Every rule pairs a query trigger with a chunk signal and a bonus. Rules are
//! independent and their bonuses add up; nothing here caps the total.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::lexicon;

#[derive(Debug, Clone, Copy)]
pub enum QueryTrigger {
    /// Lower-cased query contains any of the phrases.
    Mentions(&'static [&'static str]),
    /// Lower-cased query starts with any of the words.
    StartsWith(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub enum ChunkSignal {
    Mentions(&'static [&'static str]),
    LongerThan(usize),
    DateOrOrdinal,
    /// Bonus is paid once per named party found in both query and chunk.
    NamedParties,
}

#[derive(Debug, Clone, Copy)]
pub struct AnswerRule {
    pub name: &'static str,
    pub trigger: QueryTrigger,
    pub signal: ChunkSignal,
    pub bonus: f32,
}

pub const RULES: &[AnswerRule] = &[
    AnswerRule {
        name: "definition",
        trigger: QueryTrigger::Mentions(&["define", "definition", "what is", "what constitutes"]),
        signal: ChunkSignal::Mentions(&["means", "refers to", "constitutes", "is defined as", "represents"]),
        bonus: 0.30,
    },
    AnswerRule {
        name: "argument",
        trigger: QueryTrigger::Mentions(&["argument", "argued", "claimed", "contended", "defense"]),
        signal: ChunkSignal::NamedParties,
        bonus: 0.20,
    },
    AnswerRule {
        name: "timeline",
        trigger: QueryTrigger::Mentions(&["visit", "during", "when", "actions", "first", "second"]),
        signal: ChunkSignal::DateOrOrdinal,
        bonus: 0.25,
    },
    AnswerRule {
        name: "explanation",
        trigger: QueryTrigger::StartsWith(&["how", "why"]),
        signal: ChunkSignal::LongerThan(500),
        bonus: 0.10,
    },
    AnswerRule {
        name: "overview",
        trigger: QueryTrigger::Mentions(&["summary", "about", "overview", "case"]),
        signal: ChunkSignal::Mentions(&["overview", "introduction", "summary", "concern"]),
        bonus: 0.20,
    },
];

const KEYWORD_MIN_LEN: usize = 5;
const KEYWORD_STEP: f32 = 0.10;
const KEYWORD_CAP: f32 = 0.30;

/// Party designations recognised without capitalisation.
const PARTY_NOUNS: &[&str] = &[
    "company", "commission", "employer", "employee", "landlord", "tenant", "licensor", "licensee", "buyer", "seller",
    "supplier", "customer", "contractor", "client", "vendor", "lessor", "lessee", "complainant", "respondent",
];

impl QueryTrigger {
    fn fires(&self, query: &str) -> bool {
        match self {
            QueryTrigger::Mentions(phrases) => phrases.iter().any(|p| query.contains(p)),
            QueryTrigger::StartsWith(words) => words.iter().any(|w| query.starts_with(w)),
        }
    }
}

impl AnswerRule {
    /// Bonus this rule awards, or 0.0 when it does not fire.
    pub fn apply(&self, query: &str, chunk: &str) -> f32 {
        let query_lower = query.to_lowercase();
        if !self.trigger.fires(&query_lower) {
            return 0.0;
        }
        let chunk_lower = chunk.to_lowercase();
        match self.signal {
            ChunkSignal::Mentions(phrases) => {
                if phrases.iter().any(|p| chunk_lower.contains(p)) { self.bonus } else { 0.0 }
            }
            ChunkSignal::LongerThan(chars) => {
                if chunk.chars().count() > chars { self.bonus } else { 0.0 }
            }
            ChunkSignal::DateOrOrdinal => {
                if date_or_ordinal().is_some_and(|re| re.is_match(&chunk_lower)) { self.bonus } else { 0.0 }
            }
            ChunkSignal::NamedParties => {
                let shared = named_parties(query).into_iter().filter(|p| chunk_lower.contains(p.as_str())).count();
                self.bonus * shared as f32
            }
        }
    }
}

fn date_or_ordinal() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"\b\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}\b",
            r"|\b(19|20)\d{2}\b",
            r"|\b(january|february|march|april|june|july|august|september|october|november|december)\b",
            r"|\bmay\s+\d",
            r"|\bdate:",
            r"|\bvisit",
            r"|\b(first|second|third|fourth|fifth|\d+(st|nd|rd|th))\b",
        ))
        .ok()
    })
    .as_ref()
}

/// Lower-cased party names mentioned in the query: known party nouns plus
/// capitalised words after the first token.
fn named_parties(query: &str) -> BTreeSet<String> {
    let mut parties = BTreeSet::new();
    for (i, raw) in query.split_whitespace().enumerate() {
        let token = raw.trim_matches(|c: char| !c.is_alphanumeric());
        let lower = token.to_lowercase();
        if lower.is_empty() || lexicon::is_stopword(&lower) {
            continue;
        }
        let capitalised = token.chars().next().is_some_and(char::is_uppercase);
        if PARTY_NOUNS.contains(&lower.as_str()) || (i > 0 && capitalised && lower.len() > 2) {
            parties.insert(lower);
        }
    }
    parties
}

/// +0.10 per query word of five or more letters found in the chunk, at most +0.30.
pub fn keyword_bonus(query: &str, chunk: &str) -> f32 {
    let chunk_lower = chunk.to_lowercase();
    let hits = lexicon::words(query)
        .filter(|w| w.chars().count() >= KEYWORD_MIN_LEN)
        .filter(|w| chunk_lower.contains(w.as_str()))
        .count();
    (hits as f32 * KEYWORD_STEP).min(KEYWORD_CAP)
}

/// Sum of all triggered rule bonuses plus the keyword bonus.
pub fn score(query: &str, chunk: &str) -> f32 {
    RULES.iter().map(|rule| rule.apply(query, chunk)).sum::<f32>() + keyword_bonus(query, chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str) -> &'static AnswerRule {
        RULES.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn definition_rule_needs_both_sides() {
        let r = rule("definition");
        assert_eq!(r.apply("What is Confidential Information?", "\"Confidential Information\" means any data."), 0.30);
        assert_eq!(r.apply("What is Confidential Information?", "The parties exchange data."), 0.0);
        assert_eq!(r.apply("List the parties", "\"Party\" means a signatory."), 0.0);
    }

    #[test]
    fn argument_rule_pays_per_shared_party() {
        let r = rule("argument");
        let chunk = "The Company argued that the Commission lacked jurisdiction.";
        let bonus = r.apply("What argument did the company make against the commission?", chunk);
        assert!((bonus - 0.40).abs() < 1e-6);
        assert_eq!(r.apply("What argument did the company make?", "No parties here."), 0.0);
    }

    #[test]
    fn timeline_rule_detects_dates_and_ordinals() {
        let r = rule("timeline");
        assert_eq!(r.apply("When was the first visit?", "The inspection on 12/03/2021 found issues."), 0.25);
        assert_eq!(r.apply("When was the visit?", "The second inspection found issues."), 0.25);
        assert_eq!(r.apply("When is rent due?", "Tenant may pay rent at any time."), 0.0);
    }

    #[test]
    fn explanation_rule_prefers_long_chunks() {
        let r = rule("explanation");
        let long = "x".repeat(501);
        assert_eq!(r.apply("How does renewal work?", &long), 0.10);
        assert_eq!(r.apply("How does renewal work?", "short"), 0.0);
        assert_eq!(r.apply("Explain how renewal works", &long), 0.0);
    }

    #[test]
    fn overview_rule() {
        assert_eq!(rule("overview").apply("What is this case about?", "INTRODUCTION. This matter concerns..."), 0.20);
    }

    #[test]
    fn keyword_bonus_is_capped() {
        let chunk = "termination notice period payment schedule warranty";
        assert!((keyword_bonus("termination notice", chunk) - 0.20).abs() < 1e-6);
        assert!((keyword_bonus("termination notice period payment warranty", chunk) - 0.30).abs() < 1e-6);
        assert_eq!(keyword_bonus("who is it", chunk), 0.0);
    }

    #[test]
    fn scores_add_up() {
        let chunk = "\"Term\" means the period of this agreement.";
        let s = score("What is the definition of term agreement?", chunk);
        assert!((s - 0.40).abs() < 1e-6, "{s}");
    }
}
