//! Narrowing retries for non-answers.
//!
//! ```text
//! FirstAttempt --empty, >=2 results--> RetryNarrowed --empty, distinct best chunk--> RetrySingle --> Done
//!      |                                    |
//!      +--answer or <2 results--> Done      +--answer or no distinct chunk--> Done
//! ```
//!
//! Each state owns a fixed context computed up front, every later context is
//! contained in the one before it, and there are at most two regenerations.

use serde::Serialize;

use crate::aggregate::aggregate;
use crate::empty;
use crate::lexicon::truncate_chars;
use crate::rerank::RerankedResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryState {
    FirstAttempt,
    RetryNarrowed,
    RetrySingle,
    Done,
}

pub const MAX_RETRIES: usize = 2;
const NARROWED_CHUNKS: usize = 2;

/// Next state after an attempt in `state` produced an answer.
pub fn transition(state: RetryState, answer_empty: bool, available: usize, distinct_single: bool) -> RetryState {
    match state {
        RetryState::FirstAttempt if answer_empty && available >= 2 => RetryState::RetryNarrowed,
        RetryState::RetryNarrowed if answer_empty && distinct_single => RetryState::RetrySingle,
        _ => RetryState::Done,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub state: RetryState,
    pub context: String,
    pub answer: String,
    pub empty: bool,
}

/// Drives the attempts for one query. The caller generates an answer for
/// `pending_context()` and hands it to `record()` until the state is `Done`.
#[derive(Debug)]
pub struct RetryController {
    state: RetryState,
    available: usize,
    first: String,
    narrowed: String,
    single: Option<String>,
    attempts: Vec<Attempt>,
}

impl RetryController {
    pub fn new(ranked: &[RerankedResult], context_chunks: usize, max_chars: usize) -> Self {
        let first_k = context_chunks.max(1);
        let narrowed_k = NARROWED_CHUNKS.min(first_k);
        let narrowed = aggregate(ranked, narrowed_k, max_chars);
        // only a chunk that survived truncation into the narrowed context
        let single = best_answerability(
            ranked[..ranked.len().min(narrowed_k)]
                .iter()
                .map(|r| (r.answer_bonus, truncate_chars(&r.chunk.text, max_chars)))
                .filter(|(_, text)| narrowed.contains(*text)),
        )
        .filter(|text| *text != narrowed)
        .map(str::to_owned);
        Self {
            state: RetryState::FirstAttempt,
            available: ranked.len(),
            first: aggregate(ranked, first_k, max_chars),
            narrowed,
            single,
            attempts: Vec::with_capacity(1 + MAX_RETRIES),
        }
    }

    pub fn state(&self) -> RetryState { self.state }

    /// Context for the next generation, or `None` once done.
    pub fn pending_context(&self) -> Option<&str> {
        match self.state {
            RetryState::FirstAttempt => Some(&self.first),
            RetryState::RetryNarrowed => Some(&self.narrowed),
            RetryState::RetrySingle => self.single.as_deref(),
            RetryState::Done => None,
        }
    }

    pub fn chunks_in_context(&self, context_chunks: usize) -> usize {
        match self.state {
            RetryState::FirstAttempt => context_chunks.max(1).min(self.available),
            RetryState::RetryNarrowed => NARROWED_CHUNKS.min(context_chunks.max(1)).min(self.available),
            RetryState::RetrySingle => 1,
            RetryState::Done => 0,
        }
    }

    /// Records the answer for the pending context and moves on. Returns the
    /// new state; recording after `Done` is ignored.
    pub fn record(&mut self, answer: String) -> RetryState {
        let Some(context) = self.pending_context().map(str::to_owned) else { return self.state };
        let is_empty = empty::is_empty(&answer);
        self.attempts.push(Attempt { state: self.state, context, answer, empty: is_empty });
        self.state = transition(self.state, is_empty, self.available, self.single.is_some());
        self.state
    }

    pub fn attempts(&self) -> &[Attempt] { &self.attempts }

    pub fn retries(&self) -> usize { self.attempts.len().saturating_sub(1) }

    /// The attempt whose answer is final.
    pub fn last_attempt(&self) -> Option<&Attempt> { self.attempts.last() }
}

/// Text with the highest answer bonus; ties go to the earlier one.
fn best_answerability<'a>(candidates: impl Iterator<Item = (f32, &'a str)>) -> Option<&'a str> {
    candidates
        .fold(None, |best: Option<(f32, &'a str)>, (bonus, text)| match best {
            Some(b) if b.0 >= bonus => Some(b),
            _ => Some((bonus, text)),
        })
        .map(|(_, text)| text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::{Chunk, ChunkMetadata};

    fn ranked(items: &[(&str, f32)]) -> Vec<RerankedResult> {
        items
            .iter()
            .enumerate()
            .map(|(i, (t, bonus))| RerankedResult {
                chunk: Chunk::new(*t, ChunkMetadata { source: "d.txt".into(), page: 1, chunk_id: i }),
                similarity: 0.8,
                answer_bonus: *bonus,
                combined_score: 0.56 + 0.3 * bonus,
            })
            .collect()
    }

    const EMPTY: &str = "Not mentioned in this document.";

    #[test]
    fn transition_table() {
        use RetryState::*;
        assert_eq!(transition(FirstAttempt, false, 3, true), Done);
        assert_eq!(transition(FirstAttempt, true, 1, true), Done);
        assert_eq!(transition(FirstAttempt, true, 2, false), RetryNarrowed);
        assert_eq!(transition(RetryNarrowed, false, 3, true), Done);
        assert_eq!(transition(RetryNarrowed, true, 3, false), Done);
        assert_eq!(transition(RetryNarrowed, true, 3, true), RetrySingle);
        assert_eq!(transition(RetrySingle, true, 3, true), Done);
        assert_eq!(transition(Done, true, 3, true), Done);
    }

    #[test]
    fn good_first_answer_stops_immediately() {
        let mut c = RetryController::new(&ranked(&[("a", 0.0), ("b", 0.0), ("c", 0.0)]), 3, 1000);
        assert_eq!(c.pending_context(), Some("a\n\nb\n\nc"));
        assert_eq!(c.record("A real answer.".into()), RetryState::Done);
        assert_eq!(c.retries(), 0);
        assert_eq!(c.pending_context(), None);
    }

    #[test]
    fn empty_answers_narrow_down_to_best_chunk() {
        let mut c = RetryController::new(&ranked(&[("a", 0.1), ("b", 0.4), ("c", 0.9)]), 3, 1000);
        assert_eq!(c.record(EMPTY.into()), RetryState::RetryNarrowed);
        assert_eq!(c.pending_context(), Some("a\n\nb"));
        assert_eq!(c.record(EMPTY.into()), RetryState::RetrySingle);
        // the best chunk is picked from the narrowed context only
        assert_eq!(c.pending_context(), Some("b"));
        assert_eq!(c.record(EMPTY.into()), RetryState::Done);
        assert_eq!(c.retries(), MAX_RETRIES);
        assert_eq!(c.record("ignored".into()), RetryState::Done);
        assert_eq!(c.attempts().len(), 3);
    }

    #[test]
    fn single_result_accepts_empty_answer() {
        let mut c = RetryController::new(&ranked(&[("only", 0.0)]), 3, 1000);
        assert_eq!(c.record(EMPTY.into()), RetryState::Done);
        assert!(c.last_attempt().unwrap().empty);
    }

    #[test]
    fn contexts_never_grow() {
        let long_a = "a".repeat(20);
        let long_b = "b".repeat(10);
        let cases = [
            (ranked(&[("alpha", 0.0), ("beta", 0.0), ("gamma", 0.0)]), 1000),
            // truncation drops the best chunk from the narrowed context
            (ranked(&[(long_a.as_str(), 0.0), (long_b.as_str(), 0.9), ("cccc", 0.0)]), 10),
        ];
        for (results, max_chars) in &cases {
            let mut c = RetryController::new(results, 3, *max_chars);
            let mut previous = c.pending_context().unwrap().to_string();
            while c.record(EMPTY.into()) != RetryState::Done {
                let next = c.pending_context().unwrap().to_string();
                assert!(previous.contains(&next), "{next:?} not within {previous:?}");
                previous = next;
            }
        }
    }

    #[test]
    fn truncated_narrowed_context_has_no_single_retry() {
        let long_a = "a".repeat(20);
        let long_b = "b".repeat(10);
        let mut c = RetryController::new(&ranked(&[(long_a.as_str(), 0.0), (long_b.as_str(), 0.9), ("cccc", 0.0)]), 3, 10);
        assert_eq!(c.record(EMPTY.into()), RetryState::RetryNarrowed);
        assert_eq!(c.pending_context(), Some("aaaaaaaaaa"));
        assert_eq!(c.record(EMPTY.into()), RetryState::Done);
        assert_eq!(c.attempts().len(), 2);
    }
}
