use serde::Serialize;

use crate::confidence;
use crate::error::Result;
use crate::generate::AnswerGenerator;
use crate::lexicon::truncate_chars;
use crate::response::{extract_key_terms, extract_title, ClauseView};

use super::rules::clause_flags;

const ANALYSIS_QUERY: &str = "Provide a comprehensive analysis of this clause";
const IMPACT_FALLBACK_CHARS: usize = 300;

/// Where an analysed clause came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClauseSource {
    pub source: String,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseFindings {
    pub summary: String,
    pub meaning: String,
    pub favored_party: String,
    pub key_terms: Vec<String>,
    pub practical_impact: String,
    pub negotiation_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseMetadata {
    pub source: String,
    pub page: String,
    pub confidence: u8,
    pub confidence_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseAnalysis {
    pub clause: ClauseView,
    pub analysis: ClauseFindings,
    pub metadata: ClauseMetadata,
}

/// In-depth explanation of a single clause supplied by the caller.
pub struct ClauseAnalyzer {
    answers: AnswerGenerator,
}

impl ClauseAnalyzer {
    pub fn new(answers: AnswerGenerator) -> Self { Self { answers } }

    pub fn analyze(&self, clause_text: &str, origin: &ClauseSource) -> Result<ClauseAnalysis> {
        let context = truncate_chars(clause_text, self.answers.context_budget(ANALYSIS_QUERY));
        let answer = self.answers.answer(ANALYSIS_QUERY, context)?;
        let meaning = answer.text;

        let mut practical_impact = self.answers.practical_impact(ANALYSIS_QUERY, context)?;
        if practical_impact.is_empty() {
            practical_impact = if meaning.chars().count() > IMPACT_FALLBACK_CHARS {
                format!("{}...", truncate_chars(&meaning, IMPACT_FALLBACK_CHARS))
            } else {
                meaning.clone()
            };
        }

        let signal = confidence::estimate(ANALYSIS_QUERY, clause_text, &meaning);
        let page = origin.page.map_or_else(|| "N/A".to_string(), |p| p.to_string());
        Ok(ClauseAnalysis {
            clause: ClauseView {
                title: extract_title(clause_text, "CLAUSE ANALYSIS"),
                section: format!("{} — Page {}", origin.source, page),
                content: clause_text.to_string(),
            },
            analysis: ClauseFindings {
                summary: truncate_chars(&meaning, 200).to_string(),
                meaning,
                favored_party: "N/A".into(),
                key_terms: extract_key_terms(clause_text),
                practical_impact,
                negotiation_flags: clause_flags(clause_text),
            },
            metadata: ClauseMetadata {
                source: origin.source.clone(),
                page,
                confidence: signal.score,
                confidence_reason: signal.reason,
            },
        })
    }
}
