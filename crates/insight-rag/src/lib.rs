//! Retrieval-augmented clause insight.
//!
//! A query flows through retrieval, a low-relevance gate, answerability
//! reranking, context aggregation, generation with a bounded retry state
//! machine, confidence scoring and response assembly. `Retriever` drives the
//! pipeline; every stage is also usable on its own.

pub mod aggregate;
pub mod analysis;
pub mod answerability;
pub mod confidence;
pub mod empty;
pub mod error;
pub mod generate;
pub mod lexicon;
pub mod observe;
pub mod rerank;
pub mod response;
pub mod retriever;
pub mod retry;

pub use analysis::{ClauseAnalysis, ClauseAnalyzer, ClauseSource, DocumentAnalysis, DocumentAnalyzer};
pub use confidence::ConfidenceSignal;
pub use error::{RagError, Result};
pub use generate::{AnswerGenerator, GeneratedAnswer};
pub use observe::{NoopObserver, PipelineEvent, PipelineObserver, RecordingObserver, TracingObserver};
pub use rerank::{RerankedResult, SearchResult};
pub use response::QueryResponse;
pub use retriever::{Deadline, Retriever, NO_ANSWER_FOUND};
pub use retry::{RetryController, RetryState, MAX_RETRIES};
