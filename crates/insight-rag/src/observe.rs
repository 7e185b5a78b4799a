//! Structured pipeline events.
//!
//! Each stage reports what it did through an injected `PipelineObserver`; the
//! algorithms never log progress themselves.

use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::retry::RetryState;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    QueryReceived { query: String, top_k: usize },
    SearchCompleted { hits: usize, top_similarity: f32 },
    LowRelevance { top_similarity: f32, threshold: f32 },
    Reranked { order: Vec<String>, top_combined: f32 },
    ContextAggregated { state: RetryState, chunks: usize, chars: usize },
    GenerationAttempted { state: RetryState, chars: usize },
    EmptyAnswerDetected { state: RetryState },
    RetryAdvanced { from: RetryState, to: RetryState },
    ConfidenceScored { score: u8, reason: String },
    ResponseAssembled { title: String, confidence: u8, retries: usize },
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::QueryReceived { query, top_k } => info!(%query, top_k, "query received"),
            PipelineEvent::SearchCompleted { hits, top_similarity } => debug!(hits, top_similarity, "search completed"),
            PipelineEvent::LowRelevance { top_similarity, threshold } => {
                warn!(top_similarity, threshold, "low relevance; query appears unrelated to document")
            }
            PipelineEvent::Reranked { order, top_combined } => debug!(?order, top_combined, "reranked"),
            PipelineEvent::ContextAggregated { state, chunks, chars } => debug!(?state, chunks, chars, "context aggregated"),
            PipelineEvent::GenerationAttempted { state, chars } => debug!(?state, chars, "answer generated"),
            PipelineEvent::EmptyAnswerDetected { state } => warn!(?state, "empty answer detected"),
            PipelineEvent::RetryAdvanced { from, to } => info!(?from, ?to, "retrying with narrower context"),
            PipelineEvent::ConfidenceScored { score, reason } => debug!(score, %reason, "confidence scored"),
            PipelineEvent::ResponseAssembled { title, confidence, retries } => {
                info!(%title, confidence, retries, "response assembled")
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self { Self::default() }

    pub fn events(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, pred: impl Fn(&PipelineEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
