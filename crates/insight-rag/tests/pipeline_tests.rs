use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use insight_core::config::Settings;
use insight_core::{Chunk, ChunkMetadata, Embedder, GenerationParams, Generator, SearchHit, VectorIndex};
use insight_gen::fake::FakeGenerator;
use insight_rag::rerank::rerank;
use insight_rag::response::extract_key_terms;
use insight_rag::{
    empty, PipelineEvent, QueryResponse, RagError, RecordingObserver, Retriever, RetryState, SearchResult, MAX_RETRIES,
    NO_ANSWER_FOUND,
};
use insight_vector::{ActiveIndex, FlatIndex};

/// Returns the same vector for every text.
struct FixedEmbedder(Vec<f32>);

impl Embedder for FixedEmbedder {
    fn dim(&self) -> usize { self.0.len() }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.0.clone()).collect())
    }
}

/// Replies from a script, repeating the last line once it runs out.
struct ScriptedGenerator {
    replies: Vec<&'static str>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedGenerator {
    fn new(replies: &[&'static str]) -> Self {
        Self { replies: replies.to_vec(), prompts: Mutex::new(Vec::new()), calls: AtomicUsize::new(0), delay: Duration::ZERO }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    fn prompts(&self) -> Vec<String> { self.prompts.lock().unwrap().clone() }
}

impl Generator for ScriptedGenerator {
    fn ensure_loaded(&self) -> anyhow::Result<()> { Ok(()) }
    fn context_window_tokens(&self) -> usize { 512 }
    fn generate(&self, prompt: &str, _params: &GenerationParams) -> anyhow::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        std::thread::sleep(self.delay);
        Ok(self.replies.get(n).or(self.replies.last()).copied().unwrap_or_default().to_string())
    }
}

/// Holds chunks but never finds any of them.
struct BlindIndex(Vec<Chunk>);

impl VectorIndex for BlindIndex {
    fn dim(&self) -> usize { 2 }
    fn chunks(&self) -> &[Chunk] { &self.0 }
    fn chunk(&self, id: &str) -> Option<&Chunk> { self.0.iter().find(|c| c.id == id) }
    fn search(&self, _query: &[f32], _k: usize) -> anyhow::Result<Vec<SearchHit>> { Ok(Vec::new()) }
}

/// Fails every generation.
struct BrokenGenerator;

impl Generator for BrokenGenerator {
    fn ensure_loaded(&self) -> anyhow::Result<()> { Ok(()) }
    fn context_window_tokens(&self) -> usize { 512 }
    fn generate(&self, _prompt: &str, _params: &GenerationParams) -> anyhow::Result<String> {
        anyhow::bail!("model runtime crashed")
    }
}

fn chunk(source: &str, page: u32, chunk_id: usize, text: &str) -> Chunk {
    Chunk::new(text, ChunkMetadata { source: source.into(), page, chunk_id })
}

fn index_of(texts: &[&str]) -> Arc<ActiveIndex> {
    let mut index = FlatIndex::new(2);
    for (i, text) in texts.iter().enumerate() {
        index.add(chunk("lease.txt", 1, i, text), &[1.0, 0.0]).unwrap();
    }
    Arc::new(ActiveIndex::with_index(Arc::new(index)))
}

fn retriever(index: Arc<ActiveIndex>, query_vector: Vec<f32>, generator: Arc<dyn Generator>) -> Retriever {
    Retriever::new(Arc::new(FixedEmbedder(query_vector)), index, generator, &Settings::default())
}

const TERMINATION: &str = "TERMINATION. Either party may terminate this agreement with 30 days notice.";
const LEASE_CLAUSES: [&str; 3] = [
    "RENT. Rent is due on the first day of each month.",
    "DEPOSIT. The Tenant pays a deposit of two months rent.",
    "UTILITIES. The Tenant pays for electricity and water.",
];

#[test]
fn answers_a_termination_question_end_to_end() {
    let index = index_of(&[TERMINATION]);
    let observer = Arc::new(RecordingObserver::new());
    let retriever =
        retriever(index, vec![1.0, 0.0], Arc::new(FakeGenerator::default())).with_observer(observer.clone());

    let response = retriever.answer("How can this agreement be terminated?", 3).unwrap();

    let clause = response.clause.as_ref().unwrap();
    assert_eq!(clause.title, "TERMINATION.");
    assert_eq!(clause.section, "lease.txt — Page 1");
    assert_eq!(clause.content, TERMINATION);

    let explanation = response.explanation.as_ref().unwrap();
    assert_eq!(explanation.meaning, "Either party may terminate this agreement with 30 days notice.");
    assert_eq!(explanation.summary, explanation.meaning);
    assert_eq!(explanation.favored_party, "N/A");
    assert_eq!(explanation.key_terms, vec!["Termination", "Agreement", "Party", "Notice"]);
    assert_eq!(explanation.practical_impact, "");
    assert_eq!(explanation.confidence, 80);
    assert_eq!(
        explanation.confidence_reason,
        "Strongly grounded in retrieved context (partially addresses query, limited supporting context)"
    );

    let relevance = response.relevance.as_ref().unwrap();
    assert_eq!(relevance.score, 100);
    assert_eq!(relevance.matched_terms, vec!["agreement"]);

    assert_eq!(observer.count(|e| matches!(e, PipelineEvent::RetryAdvanced { .. })), 0);
    assert_eq!(observer.count(|e| matches!(e, PipelineEvent::ResponseAssembled { retries: 0, .. })), 1);
}

#[test]
fn response_serializes_with_camel_case_keys() {
    let index = index_of(&[TERMINATION]);
    let retriever = retriever(index, vec![1.0, 0.0], Arc::new(FakeGenerator::default()));
    let response = retriever.respond("How can this agreement be terminated?", 3).unwrap();

    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("error").is_none());
    assert_eq!(json["explanation"]["favoredParty"], "N/A");
    assert_eq!(json["explanation"]["confidence"], 80);
    assert!(json["explanation"]["confidenceReason"].is_string());
    assert!(json["relevance"]["matchedTerms"].is_array());
}

#[test]
fn unrelated_query_gets_the_low_relevance_response() {
    let index = index_of(&[TERMINATION]);
    let generator = Arc::new(ScriptedGenerator::new(&["should never be used"]));
    let observer = Arc::new(RecordingObserver::new());
    let retriever = retriever(index, vec![0.0, 1.0], generator.clone()).with_observer(observer.clone());

    let response = retriever.answer("What is the capital of France?", 3).unwrap();

    assert_eq!(response.confidence(), Some(30));
    let relevance = response.relevance.unwrap();
    assert_eq!(relevance.score, 0);
    assert!(relevance.matched_terms.is_empty());
    let clause = response.clause.unwrap();
    assert_eq!(clause.title, "Information Not Available");
    assert_eq!(clause.section, "N/A");
    assert_eq!(generator.calls(), 0);
    assert_eq!(observer.count(|e| matches!(e, PipelineEvent::LowRelevance { .. })), 1);
}

#[test]
fn empty_answers_retry_at_most_twice_with_narrowing_context() {
    let generator = Arc::new(ScriptedGenerator::new(&["Not mentioned in the context."]));
    let observer = Arc::new(RecordingObserver::new());
    let retriever =
        retriever(index_of(&LEASE_CLAUSES), vec![1.0, 0.0], generator.clone()).with_observer(observer.clone());

    let response = retriever.answer("What is the late fee?", 3).unwrap();

    assert_eq!(generator.calls(), 1 + MAX_RETRIES);
    let prompts = generator.prompts();
    assert!(prompts[1].len() <= prompts[0].len());
    assert!(prompts[2].len() <= prompts[1].len());

    assert_eq!(observer.count(|e| matches!(e, PipelineEvent::EmptyAnswerDetected { .. })), 3);
    let advances: Vec<(RetryState, RetryState)> = observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::RetryAdvanced { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        advances,
        vec![(RetryState::FirstAttempt, RetryState::RetryNarrowed), (RetryState::RetryNarrowed, RetryState::RetrySingle)]
    );
    assert_eq!(observer.count(|e| matches!(e, PipelineEvent::ResponseAssembled { retries: 2, .. })), 1);

    let explanation = response.explanation.unwrap();
    assert_eq!(explanation.meaning, NO_ANSWER_FOUND);
    assert!(explanation.confidence <= 55);
    assert!(explanation.confidence_reason.starts_with("Information not found in context"));
}

#[test]
fn retry_stops_at_the_first_real_answer() {
    let generator = Arc::new(ScriptedGenerator::new(&["Not specified.", "Rent is due on the first day of each month."]));
    let retriever = retriever(index_of(&LEASE_CLAUSES), vec![1.0, 0.0], generator.clone());

    let response = retriever.answer("When is rent due?", 3).unwrap();

    assert_eq!(generator.calls(), 2);
    assert_eq!(response.explanation.unwrap().meaning, "Rent is due on the first day of each month.");
}

#[test]
fn single_result_is_never_retried() {
    let generator = Arc::new(ScriptedGenerator::new(&["Not specified."]));
    let retriever = retriever(index_of(&[TERMINATION]), vec![1.0, 0.0], generator.clone());

    let response = retriever.answer("What is the late fee?", 3).unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(response.explanation.unwrap().meaning, NO_ANSWER_FOUND);
}

#[test]
fn not_indexed_is_reported_as_an_error_response() {
    let generator = Arc::new(ScriptedGenerator::new(&["unused"]));
    let retriever = retriever(Arc::new(ActiveIndex::empty()), vec![1.0, 0.0], generator);

    assert!(matches!(retriever.answer("anything", 3), Err(RagError::NotIndexed)));

    let response = retriever.respond("anything", 3).unwrap();
    assert_eq!(response.error.as_deref(), Some("No documents have been indexed yet. Please upload a contract first."));
    assert!(response.clause.is_none());
    assert!(response.explanation.is_none());
    assert!(response.relevance.is_none());
}

#[test]
fn empty_search_is_reported_as_an_error_response() {
    let index = Arc::new(ActiveIndex::with_index(Arc::new(BlindIndex(vec![chunk("lease.txt", 1, 0, TERMINATION)]))));
    let generator = Arc::new(ScriptedGenerator::new(&["unused"]));
    let retriever = retriever(index, vec![1.0, 0.0], generator.clone());

    assert!(matches!(retriever.answer("How can this agreement be terminated?", 3), Err(RagError::NoResults)));

    let response = retriever.respond("How can this agreement be terminated?", 3).unwrap();
    assert_eq!(response.error.as_deref(), Some("No relevant clauses found for your query."));
    assert!(response.clause.is_none());
    assert!(response.explanation.is_none());
    assert!(response.relevance.is_none());
    assert_eq!(generator.calls(), 0);
}

#[test]
fn generation_failure_is_not_turned_into_a_response() {
    let retriever = retriever(index_of(&[TERMINATION]), vec![1.0, 0.0], Arc::new(BrokenGenerator));

    let err = retriever.respond("How can this agreement be terminated?", 3).unwrap_err();
    assert!(matches!(err, RagError::Generation(_)));
    assert!(!err.is_user_facing());
}

#[test]
fn slow_generation_hits_the_request_deadline() {
    let generator = Arc::new(ScriptedGenerator::new(&["Not mentioned."]).slow(Duration::from_millis(1100)));
    let mut settings = Settings::default();
    settings.retrieval.request_timeout_secs = 1;
    let retriever =
        Retriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.0])), index_of(&LEASE_CLAUSES), generator.clone(), &settings);

    let result = retriever.respond("What is the late fee?", 3);

    assert!(matches!(result, Err(RagError::Timeout { .. })));
    assert_eq!(generator.calls(), 1);
}

#[test]
fn concurrent_queries_share_one_retriever() {
    let index = index_of(&[TERMINATION]);
    let retriever = retriever(index.clone(), vec![1.0, 0.0], Arc::new(FakeGenerator::default()));
    let expected = retriever.answer("How can this agreement be terminated?", 3).unwrap();

    let responses: Vec<QueryResponse> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| retriever.answer("How can this agreement be terminated?", 3).unwrap()))
            .collect();
        let mut fresh = FlatIndex::new(2);
        fresh.add(chunk("lease.txt", 1, 0, TERMINATION), &[1.0, 0.0]).unwrap();
        index.replace(Arc::new(fresh));
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(responses.len(), 8);
    assert!(responses.iter().all(|r| *r == expected));
}

#[test]
fn rerank_is_a_stable_permutation_with_combined_scores() {
    let texts = [
        ("The deposit is returned at the end of the lease.", 0.82),
        ("Either party may terminate on 30 days notice, effective 1 March 2024.", 0.80),
        ("Termination is defined as the end of the lease term.", 0.81),
        ("The Tenant pays rent monthly.", 0.60),
    ];
    let results: Vec<SearchResult> = texts
        .iter()
        .enumerate()
        .map(|(i, (t, s))| SearchResult { chunk: chunk("lease.txt", 1, i, t), similarity: *s })
        .collect();
    let mut input_ids: Vec<String> = results.iter().map(|r| r.chunk.id.clone()).collect();

    let ranked = rerank(results, "When can the lease be terminated?");

    for r in &ranked {
        assert!((r.combined_score - (0.7 * r.similarity + 0.3 * r.answer_bonus)).abs() < 1e-6);
    }
    assert!(ranked.windows(2).all(|w| w[0].combined_score >= w[1].combined_score));
    let mut output_ids: Vec<String> = ranked.iter().map(|r| r.chunk.id.clone()).collect();
    input_ids.sort();
    output_ids.sort();
    assert_eq!(input_ids, output_ids);
}

#[test]
fn empty_answer_detection_cases() {
    assert!(empty::is_empty("I don't have that information."));
    assert!(empty::is_empty("The notice period is not specified."));
    assert!(!empty::is_empty("Rent is due on the first day of each month."));
    let long = format!("The context does not say so directly, but {}", "the lease runs for a year. ".repeat(6));
    assert!(!empty::is_empty(&long));
}

#[test]
fn key_terms_are_deduplicated() {
    assert_eq!(extract_key_terms("NOTICE. Any notice must be in writing."), vec!["Notice"]);
}
