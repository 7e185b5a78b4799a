//! Clause- and document-level analysis on top of the answer generator.

pub mod clause;
pub mod document;
pub mod rules;

pub use clause::{ClauseAnalysis, ClauseAnalyzer, ClauseFindings, ClauseMetadata, ClauseSource};
pub use document::{DocumentAnalysis, DocumentAnalyzer, DocumentFindings, DocumentInfo, DocumentMetadata, KeyClause, PartyBalance};
pub use rules::ClauseCategory;
