//! Rule tables behind clause and document analysis.

use serde::Serialize;
use std::fmt;

/// Phrases that make generated text advisory rather than descriptive.
pub const ADVISORY_PHRASES: &[&str] = &[
    "review carefully",
    "before signing",
    "consider legal counsel",
    "consult legal",
    "seek legal advice",
    "ensure they align",
    "business needs",
    "risk tolerance",
    "you may be required",
    "you should",
    "you must",
    "we recommend",
    "it is recommended",
    "it is advisable",
    "by accessing and using",
    "by using this",
    "you agree to",
    "you accept",
];

/// Returns `text` unless it contains advisory language.
pub fn strip_advisory_language(text: &str) -> Option<&str> {
    let lower = text.to_lowercase();
    if ADVISORY_PHRASES.iter().any(|p| lower.contains(p)) {
        None
    } else {
        Some(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClauseCategory {
    Termination,
    Liability,
    #[serde(rename = "Governing Law")]
    GoverningLaw,
    Payment,
    Confidentiality,
    Warranty,
    General,
}

impl fmt::Display for ClauseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClauseCategory::Termination => "Termination",
            ClauseCategory::Liability => "Liability",
            ClauseCategory::GoverningLaw => "Governing Law",
            ClauseCategory::Payment => "Payment",
            ClauseCategory::Confidentiality => "Confidentiality",
            ClauseCategory::Warranty => "Warranty",
            ClauseCategory::General => "General",
        };
        f.write_str(name)
    }
}

/// Checked in order; the first matching stem decides.
pub const CATEGORY_RULES: &[(&[&str], ClauseCategory)] = &[
    (&["terminat"], ClauseCategory::Termination),
    (&["liab", "indemn"], ClauseCategory::Liability),
    (&["govern", "dispute"], ClauseCategory::GoverningLaw),
    (&["payment"], ClauseCategory::Payment),
    (&["confidential"], ClauseCategory::Confidentiality),
    (&["warrant"], ClauseCategory::Warranty),
];

pub fn categorize(text: &str) -> ClauseCategory {
    let lower = text.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(stems, _)| stems.iter().any(|s| lower.contains(s)))
        .map_or(ClauseCategory::General, |(_, category)| *category)
}

pub const IMPORTANCE_STEMS: &[&str] = &[
    "terminate", "terminat", "liable", "liability", "indemn", "govern", "dispute", "warrant", "confidential",
    "intellectual", "payment", "arbitrat",
];

/// +2 per importance stem present, plus one point per 200 chars up to 3.
pub fn importance(text: &str) -> u32 {
    let lower = text.to_lowercase();
    let hits = IMPORTANCE_STEMS.iter().filter(|s| lower.contains(*s)).count() as u32;
    hits * 2 + (text.chars().count() as u32 / 200).min(3)
}

/// A negotiation flag raised when `applies` holds for the lower-cased text.
pub struct FlagRule {
    pub flag: &'static str,
    pub applies: fn(&str) -> bool,
}

pub const CLAUSE_FLAG_RULES: &[FlagRule] = &[
    FlagRule {
        flag: "Asymmetric obligations - one party 'shall' while other 'may'",
        applies: |t| t.contains("shall not") && t.contains("may"),
    },
    FlagRule {
        flag: "Unlimited liability exposure",
        applies: |t| t.contains("unlimited") || (t.contains("no limit") && t.contains("liability")),
    },
    FlagRule {
        flag: "Broad indemnification clause - triple obligation",
        applies: |t| t.contains("indemnify") && t.contains("defend") && t.contains("hold harmless"),
    },
    FlagRule {
        flag: "Contains restrictive covenants - review scope and duration",
        applies: |t| t.contains("non-compete") || t.contains("non-solicitation"),
    },
];

pub const NO_CLAUSE_FLAGS: &str = "No major negotiation flags identified";

pub fn clause_flags(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let flags: Vec<String> = CLAUSE_FLAG_RULES.iter().filter(|r| (r.applies)(&lower)).map(|r| r.flag.to_string()).collect();
    if flags.is_empty() { vec![NO_CLAUSE_FLAGS.to_string()] } else { flags }
}

/// Per-category flag cases; the first case that applies wins.
pub struct CategoryFlags {
    pub category: ClauseCategory,
    pub cases: &'static [FlagRule],
}

pub const DOCUMENT_FLAG_RULES: &[CategoryFlags] = &[
    CategoryFlags {
        category: ClauseCategory::Termination,
        cases: &[
            FlagRule {
                flag: "Negotiate termination notice period and transition requirements",
                applies: |t| t.contains("at will") || t.contains("convenience"),
            },
            FlagRule { flag: "Request cure period before termination for cause", applies: |t| t.contains("cause") && !t.contains("cure") },
        ],
    },
    CategoryFlags {
        category: ClauseCategory::Liability,
        cases: &[
            FlagRule { flag: "Negotiate liability cap tied to contract value", applies: |t| t.contains("unlimited") || t.contains("no limit") },
            FlagRule {
                flag: "Add exclusion for consequential and indirect damages",
                applies: |t| !t.contains("consequential") || !t.contains("indirect"),
            },
            FlagRule { flag: "Limit indemnification scope to direct claims only", applies: |t| t.contains("defend") && t.contains("indemnify") },
        ],
    },
    CategoryFlags {
        category: ClauseCategory::Payment,
        cases: &[FlagRule {
            flag: "Consider milestone-based payments instead of upfront fees",
            applies: |t| t.contains("advance") || t.contains("upfront"),
        }],
    },
    CategoryFlags {
        category: ClauseCategory::GoverningLaw,
        cases: &[FlagRule { flag: "Review arbitration venue and cost allocation", applies: |t| t.contains("arbitration") }],
    },
    CategoryFlags {
        category: ClauseCategory::Confidentiality,
        cases: &[FlagRule {
            flag: "Negotiate time limit on confidentiality obligations",
            applies: |t| t.contains("perpetual") || t.contains("indefinite"),
        }],
    },
];

pub const NO_DOCUMENT_FLAGS: &str = "Review all key clauses with legal counsel before signing";

pub fn document_flag(category: ClauseCategory, text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    DOCUMENT_FLAG_RULES
        .iter()
        .filter(|rules| rules.category == category)
        .find_map(|rules| rules.cases.iter().find(|case| (case.applies)(&lower)))
        .map(|case| case.flag)
}

/// Document types recognised from summary vocabulary, checked in order.
pub const ASSESSMENT_RULES: &[(&[&str], &str)] = &[
    (
        &["judgment", "commission", "court", "case", "dispute", "complainant", "respondent"],
        "This is a legal judgment or decision. Key determinations and reasoning are documented in the analyzed clauses.",
    ),
    (
        &["terms", "conditions", "usage", "service", "application", "platform"],
        "This document governs usage rights and limitations. Key provisions relate to liability limitations, termination rights, and governing law.",
    ),
    (
        &["agreement", "contract", "parties hereby"],
        "This is a contractual agreement establishing obligations between parties. Key terms are identified in the analyzed clauses.",
    ),
];

pub const DEFAULT_ASSESSMENT: &str = "This document contains binding provisions. Key clauses are identified above.";
pub const GUARDED_ASSESSMENT: &str = "This document contains legal provisions. Key clauses are identified above.";

pub fn overall_assessment(summary: &str) -> String {
    let lower = summary.to_lowercase();
    let assessment = ASSESSMENT_RULES
        .iter()
        .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
        .map_or(DEFAULT_ASSESSMENT, |(_, text)| *text);
    strip_advisory_language(assessment).unwrap_or(GUARDED_ASSESSMENT).to_string()
}

/// Legal terms reported when the document mentions them, in this order.
pub const COMMON_TERMS: &[&str] = &[
    "Confidential Information",
    "Intellectual Property",
    "Indemnification",
    "Termination",
    "Force Majeure",
    "Governing Law",
    "Dispute Resolution",
    "Payment Terms",
    "Warranties",
    "Liability",
    "Non-Disclosure",
];

pub const FALLBACK_DOCUMENT_TERMS: &[&str] = &["General Legal Terms", "Standard Provisions"];
