//! Plain-text rendering for terminal output.

use insight_rag::analysis::{ClauseAnalysis, DocumentAnalysis};
use insight_rag::QueryResponse;
use insight_vector::IndexStatus;

fn bullets(lines: &mut Vec<String>, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    lines.push(format!("{heading}:"));
    lines.extend(items.iter().map(|item| format!("  - {item}")));
}

/// Joins lines, dropping trailing blank ones.
fn finish(lines: Vec<String>) -> String {
    lines.join("\n").trim_end().to_string()
}

pub fn response(response: &QueryResponse) -> String {
    if let Some(error) = &response.error {
        return error.clone();
    }
    let mut lines = Vec::new();
    if let Some(clause) = &response.clause {
        lines.push(format!("{}  ({})", clause.title, clause.section));
    }
    if let Some(explanation) = &response.explanation {
        lines.extend([String::new(), explanation.meaning.clone(), String::new()]);
        if !explanation.practical_impact.is_empty() {
            lines.push(format!("Practical impact: {}", explanation.practical_impact));
            lines.push(String::new());
        }
        bullets(&mut lines, "Key terms", &explanation.key_terms);
        lines.push(format!("Confidence: {}% ({})", explanation.confidence, explanation.confidence_reason));
    }
    if let Some(relevance) = &response.relevance {
        lines.push(format!("Relevance: {}%  matched: {}", relevance.score, relevance.matched_terms.join(", ")));
    }
    finish(lines)
}

pub fn clause(analysis: &ClauseAnalysis) -> String {
    let mut lines = vec![
        format!("{}  ({})", analysis.clause.title, analysis.clause.section),
        String::new(),
        analysis.analysis.meaning.clone(),
        String::new(),
        format!("Practical impact: {}", analysis.analysis.practical_impact),
        String::new(),
    ];
    bullets(&mut lines, "Key terms", &analysis.analysis.key_terms);
    bullets(&mut lines, "Negotiation flags", &analysis.analysis.negotiation_flags);
    lines.push(format!("Confidence: {}% ({})", analysis.metadata.confidence, analysis.metadata.confidence_reason));
    finish(lines)
}

pub fn document(analysis: &DocumentAnalysis) -> String {
    let findings = &analysis.analysis;
    let mut lines = vec![
        format!(
            "{}  ({} clauses, {} pages)",
            analysis.document.title, analysis.document.total_clauses, analysis.metadata.total_pages
        ),
        String::new(),
        findings.summary.clone(),
        String::new(),
        findings.overall_assessment.clone(),
        String::new(),
        "Key clauses:".to_string(),
    ];
    lines.extend(findings.key_clauses.iter().map(|clause| {
        format!("  [{}] {} (page {}, importance {})", clause.category, clause.title, clause.page, clause.importance_score)
    }));
    lines.extend([
        String::new(),
        format!("Party balance: {}", findings.party_balance.assessment),
        format!("Practical impact: {}", findings.practical_impact),
        String::new(),
    ]);
    bullets(&mut lines, "Key terms", &findings.key_terms);
    bullets(&mut lines, "Negotiation flags", &findings.negotiation_flags);
    lines.push(format!("Confidence: {}% ({})", analysis.metadata.confidence, analysis.metadata.confidence_reason));
    finish(lines)
}

pub fn status(status: &IndexStatus) -> String {
    if !status.ready {
        return "Index: not ready (run `insight ingest`)".to_string();
    }
    let created = status.created_at.map_or_else(|| "unknown".to_string(), |t| t.to_rfc3339());
    format!(
        "Index: ready\n  chunks: {}\n  pages: {}\n  sources: {}\n  built: {}",
        status.chunks,
        status.pages,
        status.sources.join(", "),
        created
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines() {
        assert!(status(&IndexStatus::not_ready()).contains("not ready"));
        let ready = IndexStatus { ready: true, chunks: 3, sources: vec!["a.txt".into()], pages: 2, created_at: None };
        let text = status(&ready);
        assert!(text.contains("chunks: 3"));
        assert!(text.contains("built: unknown"));
    }

    #[test]
    fn error_response_is_just_the_message() {
        let response = QueryResponse { error: Some("No relevant clauses found for your query.".into()), clause: None, explanation: None, relevance: None };
        assert_eq!(super::response(&response), "No relevant clauses found for your query.");
    }

    #[test]
    fn bullets_skip_empty_lists() {
        let mut lines = vec!["Title".to_string(), String::new()];
        bullets(&mut lines, "Key terms", &[]);
        bullets(&mut lines, "Negotiation flags", &["Unilateral termination".to_string()]);
        assert_eq!(finish(lines), "Title\n\nNegotiation flags:\n  - Unilateral termination");
    }
}
