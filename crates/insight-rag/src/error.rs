use std::time::Duration;
use thiserror::Error;

/// Failures of the answering pipeline.
///
/// A low-relevance query and an answer that stays empty after retries are
/// outcomes, not errors; they come back as ordinary responses.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("No documents have been indexed yet. Please upload a contract first.")]
    NotIndexed,
    #[error("No relevant clauses found for your query.")]
    NoResults,
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),
    #[error("index search failed: {0}")]
    Search(#[source] anyhow::Error),
    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),
    #[error("request timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },
}

impl RagError {
    /// Errors the caller should see as a message rather than a service fault.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, RagError::NotIndexed | RagError::NoResults)
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
