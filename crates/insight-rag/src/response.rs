//! Caller-facing response shape and the extraction helpers that fill it.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use insight_core::ChunkMetadata;

use crate::confidence::{ConfidenceSignal, LOW_RELEVANCE_SCORE};
use crate::error::RagError;
use crate::lexicon::{self, dedup_case_insensitive, title_case, truncate_chars};

pub const NO_INFORMATION: &str = "I don't have information about that in this document.";
pub const MAX_KEY_TERMS: usize = 6;
pub const MAX_MATCHED_TERMS: usize = 6;
const MAX_TITLE_WORDS: usize = 10;
const MAX_TITLE_CHARS: usize = 100;
const SUMMARY_CHARS: usize = 200;
const TITLE_SCAN_LINES: usize = 3;

const LEGAL_KEYWORDS: &[&str] = &[
    "agreement", "party", "parties", "termination", "notice", "confidential", "liability", "indemnify", "breach",
    "obligation", "payment", "warranty", "representation", "dispute",
];
const FALLBACK_KEY_TERMS: &[&str] = &["Contract", "Agreement", "Clause"];
const FALLBACK_MATCHED_TERMS: &[&str] = &["contract", "clause", "legal"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseView {
    pub title: String,
    pub section: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub summary: String,
    pub meaning: String,
    pub favored_party: String,
    pub key_terms: Vec<String>,
    pub practical_impact: String,
    pub confidence: u8,
    pub confidence_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relevance {
    pub score: u8,
    pub matched_terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub clause: Option<ClauseView>,
    pub explanation: Option<Explanation>,
    pub relevance: Option<Relevance>,
}

impl QueryResponse {
    /// The user-facing error shape for `NotIndexed` and `NoResults`; any
    /// other error is handed back unchanged.
    pub fn from_error(err: RagError) -> Result<Self, RagError> {
        if err.is_user_facing() {
            Ok(Self { error: Some(err.to_string()), clause: None, explanation: None, relevance: None })
        } else {
            Err(err)
        }
    }

    /// Fixed response for queries that match nothing in the corpus.
    pub fn low_relevance(top_similarity: f32) -> Self {
        Self {
            error: None,
            clause: Some(ClauseView { title: "Information Not Available".into(), section: "N/A".into(), content: String::new() }),
            explanation: Some(Explanation {
                summary: NO_INFORMATION.into(),
                meaning: NO_INFORMATION.into(),
                favored_party: "N/A".into(),
                key_terms: Vec::new(),
                practical_impact: String::new(),
                confidence: LOW_RELEVANCE_SCORE,
                confidence_reason: "Query does not match document content".into(),
            }),
            relevance: Some(Relevance { score: relevance_score(top_similarity), matched_terms: Vec::new() }),
        }
    }

    pub fn confidence(&self) -> Option<u8> {
        self.explanation.as_ref().map(|e| e.confidence)
    }
}

/// Everything needed to assemble a normal answer.
pub struct AnswerParts<'a> {
    pub query: &'a str,
    pub chunk_text: &'a str,
    pub metadata: &'a ChunkMetadata,
    pub similarity: f32,
    pub answer: &'a str,
    pub practical_impact: String,
    pub confidence: ConfidenceSignal,
}

pub fn assemble(parts: AnswerParts<'_>) -> QueryResponse {
    QueryResponse {
        error: None,
        clause: Some(ClauseView {
            title: extract_title(parts.chunk_text, "RETRIEVED CLAUSE"),
            section: section_label(parts.metadata),
            content: parts.chunk_text.to_string(),
        }),
        explanation: Some(Explanation {
            summary: truncate_chars(parts.answer, SUMMARY_CHARS).to_string(),
            meaning: parts.answer.to_string(),
            favored_party: "N/A".into(),
            key_terms: extract_key_terms(parts.chunk_text),
            practical_impact: parts.practical_impact,
            confidence: parts.confidence.score,
            confidence_reason: parts.confidence.reason,
        }),
        relevance: Some(Relevance {
            score: relevance_score(parts.similarity),
            matched_terms: extract_matched_terms(parts.query, parts.chunk_text),
        }),
    }
}

pub fn section_label(metadata: &ChunkMetadata) -> String {
    format!("{} — Page {}", metadata.source, metadata.page)
}

/// Similarity as a 0–100 percentage.
pub fn relevance_score(similarity: f32) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Python-style `isupper`: at least one cased letter and no lower-case ones.
fn is_all_upper(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}

fn numbered_section() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\d+|\b[Aa]rticle\s+\d+").ok()).as_ref()
}

/// Leading heading of a line such as `"TERMINATION."` in
/// `"TERMINATION. Either party may..."`.
/// At least one word of two or more letters, ignoring a trailing period.
/// Keeps initials such as "A." or "U.S." from passing as headings.
fn has_heading_word(s: &str) -> bool {
    s.split_whitespace().map(|w| w.trim_end_matches('.')).any(|w| w.chars().count() >= 2 && w.chars().all(char::is_alphabetic))
}

fn leading_sentence(line: &str) -> Option<&str> {
    line.find(". ").map(|i| &line[..=i])
}

/// Display title of a chunk: an all-caps heading among the first three lines,
/// else a numbered section or article line, else the upper-cased first line.
pub fn extract_title(text: &str, fallback: &str) -> String {
    let lines: Vec<&str> = text.lines().take(TITLE_SCAN_LINES).map(str::trim).collect();
    for line in &lines {
        for candidate in [Some(*line), leading_sentence(line)].into_iter().flatten() {
            let candidate = candidate.trim();
            if is_all_upper(candidate) && has_heading_word(candidate) && candidate.split_whitespace().count() <= MAX_TITLE_WORDS {
                return candidate.to_string();
            }
        }
    }
    if let Some(re) = numbered_section() {
        if let Some(line) = lines.iter().find(|l| re.is_match(l)) {
            return line.to_uppercase();
        }
    }
    let first = text.lines().next().unwrap_or("").trim();
    if first.is_empty() {
        return fallback.to_string();
    }
    if first.chars().count() > MAX_TITLE_CHARS {
        format!("{}...", truncate_chars(first, MAX_TITLE_CHARS)).to_uppercase()
    } else {
        first.to_uppercase()
    }
}

fn caps_run() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{2,}[A-Z\s]{0,20}\b").ok()).as_ref()
}

/// Up to six title-cased terms: capitalised runs from the text, then legal
/// keywords it mentions. Falls back to a generic set.
pub fn extract_key_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    if let Some(re) = caps_run() {
        terms.extend(
            re.find_iter(text)
                .map(|m| m.as_str().trim())
                .filter(|t| t.chars().count() > 2)
                .take(4)
                .map(title_case),
        );
    }
    let lower = text.to_lowercase();
    terms.extend(LEGAL_KEYWORDS.iter().filter(|k| lower.contains(*k)).map(|k| title_case(k)));
    let mut terms = dedup_case_insensitive(terms);
    terms.truncate(MAX_KEY_TERMS);
    if terms.is_empty() {
        return FALLBACK_KEY_TERMS.iter().map(|t| t.to_string()).collect();
    }
    terms
}

/// Query words (minus stopwords and short words) that occur in the text.
pub fn extract_matched_terms(query: &str, text: &str) -> Vec<String> {
    let text_lower = text.to_lowercase();
    let matched: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .filter(|raw| raw.chars().count() > 2)
        .map(|raw| raw.trim_matches(|c| ".,!?;:".contains(c)).to_string())
        .filter(|w| !w.is_empty() && !lexicon::is_stopword(w))
        .filter(|w| text_lower.contains(w.as_str()))
        .collect();
    let mut matched = dedup_case_insensitive(matched);
    matched.truncate(MAX_MATCHED_TERMS);
    if matched.is_empty() {
        return FALLBACK_MATCHED_TERMS.iter().map(|t| t.to_string()).collect();
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefers_caps_heading() {
        assert_eq!(extract_title("TERMINATION.\nEither party may terminate.", "X"), "TERMINATION.");
        assert_eq!(extract_title("TERMINATION. Either party may terminate this agreement.", "X"), "TERMINATION.");
        assert_eq!(extract_title("intro\nGOVERNING LAW\nOhio law applies.", "X"), "GOVERNING LAW");
    }

    #[test]
    fn initials_are_not_headings() {
        assert_eq!(
            extract_title("A. Payment under Section 4.2 is due monthly.", "X"),
            "A. PAYMENT UNDER SECTION 4.2 IS DUE MONTHLY."
        );
        assert_eq!(extract_title("U.S. law governs this agreement.", "X"), "U.S. LAW GOVERNS THIS AGREEMENT.");
        assert_eq!(extract_title("I.\nARTICLE 7 INDEMNITY\nThe tenant shall indemnify.", "X"), "ARTICLE 7 INDEMNITY");
    }

    #[test]
    fn title_falls_back_to_numbered_section_then_first_line() {
        assert_eq!(extract_title("Under clause 12.2 the buyer pays.", "X"), "UNDER CLAUSE 12.2 THE BUYER PAYS.");
        assert_eq!(extract_title("See Article 4 for details", "X"), "SEE ARTICLE 4 FOR DETAILS");
        assert_eq!(extract_title("plain first line\nsecond", "X"), "PLAIN FIRST LINE");
        let long = "a".repeat(120);
        assert_eq!(extract_title(&long, "X"), format!("{}...", "A".repeat(100)));
        assert_eq!(extract_title("   ", "RETRIEVED CLAUSE"), "RETRIEVED CLAUSE");
    }

    #[test]
    fn key_terms_from_caps_and_keywords() {
        let terms = extract_key_terms("TERMINATION. Either party may terminate this agreement with 30 days notice.");
        assert_eq!(terms, vec!["Termination", "Agreement", "Party", "Notice"]);
    }

    #[test]
    fn key_terms_dedup_and_fallback() {
        assert_eq!(extract_key_terms("NOTICE must be given. Notice is written."), vec!["Notice"]);
        assert_eq!(extract_key_terms("nothing relevant here"), vec!["Contract", "Agreement", "Clause"]);
    }

    #[test]
    fn matched_terms_filter_stopwords() {
        let terms = extract_matched_terms("How can this agreement be terminated?", "Either party may terminate this agreement.");
        assert_eq!(terms, vec!["agreement"]);
        assert_eq!(extract_matched_terms("Who pays?", "Rent is due."), vec!["contract", "clause", "legal"]);
    }

    #[test]
    fn relevance_is_a_clamped_percentage() {
        assert_eq!(relevance_score(0.876), 88);
        assert_eq!(relevance_score(1.2), 100);
        assert_eq!(relevance_score(-0.3), 0);
    }

    #[test]
    fn error_shape_only_for_user_facing_errors() {
        let r = QueryResponse::from_error(RagError::NotIndexed).unwrap();
        assert!(r.error.unwrap().starts_with("No documents have been indexed"));
        assert!(r.clause.is_none() && r.explanation.is_none() && r.relevance.is_none());
        assert!(QueryResponse::from_error(RagError::Generation(anyhow::anyhow!("boom"))).is_err());
    }

    #[test]
    fn serialises_camel_case() {
        let json = serde_json::to_value(QueryResponse::low_relevance(0.31)).unwrap();
        assert_eq!(json["explanation"]["confidence"], 30);
        assert_eq!(json["explanation"]["favoredParty"], "N/A");
        assert_eq!(json["relevance"]["matchedTerms"], serde_json::json!([]));
        assert_eq!(json["relevance"]["score"], 31);
        assert!(json.get("error").is_none());
    }
}
