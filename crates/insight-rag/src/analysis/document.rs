use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use insight_core::{Chunk, VectorIndex};
use insight_vector::ActiveIndex;

use crate::error::{RagError, Result};
use crate::generate::AnswerGenerator;
use crate::lexicon::{dedup_case_insensitive, title_case, truncate_chars};

use super::rules::{
    categorize, document_flag, importance, overall_assessment, strip_advisory_language, ClauseCategory, COMMON_TERMS,
    FALLBACK_DOCUMENT_TERMS, NO_DOCUMENT_FLAGS,
};

const SUMMARY_CHUNKS: usize = 10;
const SUMMARY_INPUT_CHARS: usize = 2000;
const SUMMARY_MIN_CHARS: usize = 50;
const SUMMARY_FALLBACK: &str = "This is a legal document establishing rights and obligations between parties.";
const SUMMARY_QUERY: &str = "Provide a detailed summary of this document. Describe:
1. What type of document this is (case judgment, contract, agreement, terms, etc.)
2. If it's a legal case: What happened? Who are the parties? What was the dispute? What did the court/commission decide?
3. If it's a contract/agreement: What is the purpose? What are the main obligations?
4. Key facts, events, or provisions.

Be specific and factual. Do not give generic legal advice. Only describe what is in this document.";

const KEY_CLAUSE_MIN_CHARS: usize = 100;
const MAX_KEY_CLAUSES: usize = 5;
const PREVIEW_CHARS: usize = 200;
const QUOTE_CHARS: usize = 250;
const MAX_FLAGS: usize = 4;
const MAX_IMPACTS: usize = 3;
const BASE_CONFIDENCE: u8 = 70;
const CONFIDENCE_PER_CLAUSE: usize = 3;
const MAX_CLAUSE_BONUS: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyClause {
    pub clause_id: usize,
    pub title: String,
    pub content: String,
    pub full_content: String,
    pub quote: String,
    pub section: String,
    pub page: u32,
    pub category: ClauseCategory,
    pub importance_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyBalance {
    pub assessment: String,
    pub basis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub title: String,
    pub total_clauses: usize,
    pub analyzed_clauses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFindings {
    pub summary: String,
    pub overall_assessment: String,
    pub key_clauses: Vec<KeyClause>,
    pub party_balance: PartyBalance,
    pub key_terms: Vec<String>,
    pub practical_impact: String,
    pub negotiation_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub source: String,
    pub total_pages: usize,
    pub confidence: u8,
    pub confidence_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentAnalysis {
    pub document: DocumentInfo,
    pub analysis: DocumentFindings,
    pub metadata: DocumentMetadata,
}

/// Whole-document overview built from every indexed chunk.
pub struct DocumentAnalyzer {
    index: Arc<ActiveIndex>,
    answers: AnswerGenerator,
}

impl DocumentAnalyzer {
    pub fn new(index: Arc<ActiveIndex>, answers: AnswerGenerator) -> Self { Self { index, answers } }

    pub fn analyze(&self) -> Result<DocumentAnalysis> {
        let index = self.index.current().ok_or(RagError::NotIndexed)?;
        self.analyze_chunks(index.chunks())
    }

    pub fn analyze_chunks(&self, chunks: &[Chunk]) -> Result<DocumentAnalysis> {
        let first = chunks.first().ok_or(RagError::NoResults)?;
        info!(chunks = chunks.len(), "analyzing document");

        let summary = self.summarize(chunks)?;
        let key_clauses = identify_key_clauses(chunks);
        let total_pages = chunks.iter().map(|c| (c.metadata.source.as_str(), c.metadata.page)).collect::<BTreeSet<_>>().len();
        let confidence = BASE_CONFIDENCE + (key_clauses.len() * CONFIDENCE_PER_CLAUSE).min(MAX_CLAUSE_BONUS) as u8;
        let confidence_reason = format!("Analyzed all {} clauses and identified {} key provisions", chunks.len(), key_clauses.len());

        let analysis = DocumentFindings {
            overall_assessment: overall_assessment(&summary),
            summary,
            party_balance: PartyBalance {
                assessment: party_balance(&key_clauses),
                basis: "Based on concentration of obligations and clause distribution".into(),
            },
            key_terms: document_key_terms(chunks),
            practical_impact: practical_impact(&key_clauses),
            negotiation_flags: negotiation_flags(&key_clauses),
            key_clauses,
        };
        info!(key_clauses = analysis.key_clauses.len(), confidence, "document analysis complete");
        Ok(DocumentAnalysis {
            document: DocumentInfo { title: first.metadata.source.clone(), total_clauses: chunks.len(), analyzed_clauses: chunks.len() },
            analysis,
            metadata: DocumentMetadata { source: first.metadata.source.clone(), total_pages, confidence, confidence_reason },
        })
    }

    fn summarize(&self, chunks: &[Chunk]) -> Result<String> {
        let joined = chunks.iter().take(SUMMARY_CHUNKS).map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let text = truncate_chars(&joined, SUMMARY_INPUT_CHARS);
        let answer = self.answers.answer(SUMMARY_QUERY, text)?;
        Ok(match strip_advisory_language(&answer.text) {
            Some(summary) if summary.chars().count() >= SUMMARY_MIN_CHARS => summary.to_string(),
            _ => SUMMARY_FALLBACK.to_string(),
        })
    }
}

/// Heading-like first lines become titles; otherwise the first eight words.
fn clause_title(text: &str) -> String {
    if let Some(line) = text.lines().take(3).map(str::trim).find(|l| !l.is_empty() && l.split_whitespace().count() <= 10) {
        return title_case(line);
    }
    let first_words = text.split_whitespace().take(8).collect::<Vec<_>>().join(" ");
    if first_words.chars().count() > 50 { format!("{first_words}...") } else { first_words }
}

pub fn identify_key_clauses(chunks: &[Chunk]) -> Vec<KeyClause> {
    let mut scored: Vec<(usize, &Chunk, u32)> = chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| c.text.chars().count() > KEY_CLAUSE_MIN_CHARS)
        .map(|(i, c)| (i, c, importance(&c.text)))
        .collect();
    scored.sort_by(|a, b| b.2.cmp(&a.2));

    let key_clauses: Vec<KeyClause> = scored
        .into_iter()
        .take(MAX_KEY_CLAUSES)
        .map(|(clause_id, chunk, importance_score)| {
            let text = &chunk.text;
            let content = if text.chars().count() > PREVIEW_CHARS {
                format!("{}...", truncate_chars(text, PREVIEW_CHARS))
            } else {
                text.clone()
            };
            KeyClause {
                clause_id,
                title: clause_title(text),
                content,
                full_content: text.clone(),
                quote: truncate_chars(text, QUOTE_CHARS).to_string(),
                section: chunk.metadata.source.clone(),
                page: chunk.metadata.page,
                category: categorize(text),
                importance_score,
            }
        })
        .collect();
    if !key_clauses.is_empty() {
        return key_clauses;
    }
    chunks
        .first()
        .map(|chunk| KeyClause {
            clause_id: 0,
            title: "General Provisions".into(),
            content: truncate_chars(&chunk.text, PREVIEW_CHARS).to_string(),
            full_content: chunk.text.clone(),
            quote: truncate_chars(&chunk.text, QUOTE_CHARS).to_string(),
            section: "Document".into(),
            page: 1,
            category: ClauseCategory::General,
            importance_score: 0,
        })
        .into_iter()
        .collect()
}

pub fn party_balance(key_clauses: &[KeyClause]) -> String {
    let mut unilateral = 0u32;
    let mut liability_heavy = false;
    let mut findings: Vec<&str> = Vec::new();
    for clause in key_clauses {
        let text = clause.full_content.to_lowercase();
        let shall_not = text.matches("shall not").count();
        if shall_not > 0 && shall_not > text.matches("may").count() {
            unilateral += 1;
            findings.push("Asymmetric 'shall not' obligations");
        }
        match clause.category {
            ClauseCategory::Liability => {
                if text.contains("unlimited") {
                    unilateral += 2;
                    liability_heavy = true;
                    findings.push("Unlimited liability provision");
                } else if ["any and all", "hold harmless", "defend and indemnify"].iter().any(|p| text.contains(p)) {
                    unilateral += 1;
                    liability_heavy = true;
                    findings.push("Broad indemnification language");
                }
            }
            ClauseCategory::Termination => {
                if text.contains("without cause") || text.contains("at will") {
                    findings.push("Unilateral termination rights");
                } else if !text.contains("mutual") {
                    unilateral += 1;
                    findings.push("Non-mutual termination conditions");
                }
            }
            _ => {}
        }
    }
    let findings = dedup_case_insensitive(findings);
    if findings.is_empty() {
        return "Clause balance cannot be determined from analyzed clauses".into();
    }
    let top = findings.iter().take(2).cloned().collect::<Vec<_>>().join(", ").to_lowercase();
    if unilateral >= 3 || liability_heavy {
        format!("Favors drafting party: {top}")
    } else if unilateral >= 1 {
        format!("Mixed: {top}")
    } else {
        "Balanced based on analyzed clauses".into()
    }
}

pub fn document_key_terms(chunks: &[Chunk]) -> Vec<String> {
    let combined = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ").to_lowercase();
    let found = dedup_case_insensitive(COMMON_TERMS.iter().filter(|t| combined.contains(&t.to_lowercase())).copied());
    if found.is_empty() {
        return FALLBACK_DOCUMENT_TERMS.iter().map(|t| t.to_string()).collect();
    }
    found
}

pub fn practical_impact(key_clauses: &[KeyClause]) -> String {
    let has = |category: ClauseCategory| key_clauses.iter().any(|c| c.category == category);
    let mut parts: Vec<&str> = Vec::new();
    if has(ClauseCategory::Termination) {
        parts.push("Contract termination conditions are defined in key clauses");
    }
    if has(ClauseCategory::Liability) {
        let indemnity = key_clauses
            .iter()
            .filter(|c| c.category == ClauseCategory::Liability)
            .any(|c| c.full_content.to_lowercase().contains("indemnif"));
        parts.push(if indemnity { "Indemnification obligations are specified" } else { "Liability terms and limitations are defined" });
    }
    if has(ClauseCategory::Payment) {
        parts.push("Payment obligations and terms are specified");
    }
    if has(ClauseCategory::GoverningLaw) {
        parts.push("Jurisdiction and governing law are established");
    }
    if has(ClauseCategory::Confidentiality) {
        parts.push("Confidentiality restrictions apply to information sharing");
    }
    if has(ClauseCategory::Warranty) {
        parts.push("Warranties or disclaimers are specified");
    }
    if parts.is_empty() {
        return "Key provisions are identified in the analyzed clauses above.".into();
    }
    format!("{}.", parts.into_iter().take(MAX_IMPACTS).collect::<Vec<_>>().join(". "))
}

pub fn negotiation_flags(key_clauses: &[KeyClause]) -> Vec<String> {
    let flags = key_clauses.iter().filter_map(|c| document_flag(c.category, &c.full_content));
    let mut flags = dedup_case_insensitive(flags);
    flags.truncate(MAX_FLAGS);
    if flags.is_empty() {
        return vec![NO_DOCUMENT_FLAGS.to_string()];
    }
    flags
}
