use std::sync::Arc;
use std::time::{Duration, Instant};

use insight_core::config::{RetrievalSettings, Settings};
use insight_core::{Embedder, Generator, VectorIndex};
use insight_vector::ActiveIndex;

use crate::confidence;
use crate::error::{RagError, Result};
use crate::generate::{wants_practical_impact, AnswerGenerator};
use crate::observe::{PipelineEvent, PipelineObserver, TracingObserver};
use crate::rerank::{rerank, SearchResult};
use crate::response::{assemble, AnswerParts, QueryResponse};
use crate::retry::{RetryController, RetryState};

/// Final answer when every attempt came back empty.
pub const NO_ANSWER_FOUND: &str = "No information about that could be found in this document.";

/// Wall-clock budget of one request.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn start(limit: Option<Duration>) -> Self {
        Self { started: Instant::now(), limit }
    }

    pub fn check(&self) -> Result<()> {
        let elapsed = self.started.elapsed();
        match self.limit {
            Some(limit) if elapsed > limit => Err(RagError::Timeout { elapsed }),
            _ => Ok(()),
        }
    }
}

/// Answers questions against the active clause index.
///
/// Holds no per-query state, so one instance can serve concurrent callers.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<ActiveIndex>,
    answers: AnswerGenerator,
    observer: Arc<dyn PipelineObserver>,
    settings: RetrievalSettings,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<ActiveIndex>, generator: Arc<dyn Generator>, settings: &Settings) -> Self {
        Self {
            embedder,
            index,
            answers: AnswerGenerator::from_settings(generator, &settings.generation),
            observer: Arc::new(TracingObserver),
            settings: settings.retrieval.clone(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn answers(&self) -> &AnswerGenerator { &self.answers }

    pub fn index(&self) -> &Arc<ActiveIndex> { &self.index }

    fn emit(&self, event: PipelineEvent) {
        self.observer.on_event(&event);
    }

    /// Like `answer`, but `NotIndexed` and `NoResults` come back as the error
    /// response shape.
    pub fn respond(&self, query: &str, top_k: usize) -> Result<QueryResponse> {
        self.answer(query, top_k).or_else(QueryResponse::from_error)
    }

    pub fn answer(&self, query: &str, top_k: usize) -> Result<QueryResponse> {
        let deadline = Deadline::start(self.settings.request_timeout());
        self.emit(PipelineEvent::QueryReceived { query: query.to_string(), top_k });

        let index = self.index.current().filter(|i| !i.is_empty()).ok_or(RagError::NotIndexed)?;

        deadline.check()?;
        let vector = self.embedder.embed(query).map_err(RagError::Embedding)?;
        deadline.check()?;
        let hits = index.search(&vector, top_k.max(1)).map_err(RagError::Search)?;
        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter_map(|hit| index.chunk(&hit.id).map(|chunk| SearchResult { chunk: chunk.clone(), similarity: hit.score }))
            .collect();
        if results.is_empty() {
            return Err(RagError::NoResults);
        }

        let top_similarity = results.iter().map(|r| r.similarity).fold(f32::NEG_INFINITY, f32::max);
        self.emit(PipelineEvent::SearchCompleted { hits: results.len(), top_similarity });
        if top_similarity < self.settings.relevance_threshold {
            self.emit(PipelineEvent::LowRelevance { top_similarity, threshold: self.settings.relevance_threshold });
            return Ok(QueryResponse::low_relevance(top_similarity));
        }

        let ranked = rerank(results, query);
        self.emit(PipelineEvent::Reranked {
            order: ranked.iter().map(|r| r.chunk.id.clone()).collect(),
            top_combined: ranked.first().map_or(0.0, |r| r.combined_score),
        });

        let context_chunks = self.settings.context_chunks;
        let mut controller = RetryController::new(&ranked, context_chunks, self.answers.context_budget(query));
        while let Some(context) = controller.pending_context().map(str::to_owned) {
            let state = controller.state();
            self.emit(PipelineEvent::ContextAggregated {
                state,
                chunks: controller.chunks_in_context(context_chunks),
                chars: context.chars().count(),
            });
            deadline.check()?;
            let generated = self.answers.answer(query, &context)?;
            self.emit(PipelineEvent::GenerationAttempted { state, chars: generated.text.chars().count() });
            if generated.is_empty {
                self.emit(PipelineEvent::EmptyAnswerDetected { state });
            }
            let next = controller.record(generated.text);
            if next != RetryState::Done {
                self.emit(PipelineEvent::RetryAdvanced { from: state, to: next });
            }
        }

        let retries = controller.retries();
        let attempt = controller.last_attempt().ok_or_else(|| RagError::Generation(anyhow::anyhow!("no generation attempt was made")))?;
        let answer = if attempt.empty || attempt.answer.trim().is_empty() { NO_ANSWER_FOUND } else { attempt.answer.as_str() };

        let practical_impact = if wants_practical_impact(query) {
            deadline.check()?;
            self.answers.impact_of(&attempt.context)?
        } else {
            String::new()
        };

        let signal = confidence::estimate(query, &attempt.context, answer);
        self.emit(PipelineEvent::ConfidenceScored { score: signal.score, reason: signal.reason.clone() });

        let best = &ranked[0];
        let response = assemble(AnswerParts {
            query,
            chunk_text: &best.chunk.text,
            metadata: &best.chunk.metadata,
            similarity: best.similarity,
            answer,
            practical_impact,
            confidence: signal,
        });
        if let Some(clause) = &response.clause {
            self.emit(PipelineEvent::ResponseAssembled {
                title: clause.title.clone(),
                confidence: response.confidence().unwrap_or_default(),
                retries,
            });
        }
        Ok(response)
    }
}
