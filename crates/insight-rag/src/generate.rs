//! Prompting the generation capability and cleaning up what it returns.

use std::sync::Arc;

use insight_core::config::GenerationSettings;
use insight_core::{GenerationParams, Generator};

use crate::empty;
use crate::error::{RagError, Result};
use crate::lexicon::truncate_chars;

const PROMPT_HEAD: &str =
    "Answer the question using the context below. Provide a complete answer with details, not just a title or heading.\n\nQuestion: ";
const PROMPT_CONTEXT: &str = "\n\nContext:\n";
const PROMPT_TAIL: &str = "\n\nComplete answer:";

/// Context never shrinks below this many characters, however long the query.
pub const MIN_CONTEXT_CHARS: usize = 600;

const IMPACT_CONTEXT_CHARS: usize = 1000;
const IMPACT_MAX_LENGTH: usize = 200;
const IMPACT_MIN_LENGTH: usize = 30;
const IMPACT_TRIGGERS: &[&str] = &["impact", "affect", "consequence", "mean", "result", "happen"];

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    pub is_empty: bool,
}

pub fn build_prompt(query: &str, context: &str) -> String {
    format!("{PROMPT_HEAD}{query}{PROMPT_CONTEXT}{context}{PROMPT_TAIL}")
}

fn prompt_overhead_chars() -> usize {
    PROMPT_HEAD.len() + PROMPT_CONTEXT.len() + PROMPT_TAIL.len()
}

/// Characters of context that fit the generator's window next to the
/// instructions and the query.
pub fn context_budget(window_tokens: usize, chars_per_token: f32, query: &str) -> usize {
    let window_chars = (window_tokens as f32 * chars_per_token.max(0.0)) as usize;
    window_chars
        .saturating_sub(prompt_overhead_chars())
        .saturating_sub(query.chars().count())
        .max(MIN_CONTEXT_CHARS)
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Makes `text` end on a complete sentence: cut back to the last terminal
/// punctuation in its second half, or append a period when there is none.
pub fn complete_sentence(text: &str) -> String {
    let text = text.trim();
    let Some(last) = text.chars().last() else { return String::new() };
    if is_terminal(last) {
        return text.to_string();
    }
    let half = text.chars().count() / 2;
    let cut = text
        .char_indices()
        .enumerate()
        .filter(|(n, (_, c))| *n >= half && is_terminal(*c))
        .map(|(_, (idx, c))| idx + c.len_utf8())
        .last();
    match cut {
        Some(end) => text[..end].to_string(),
        None => format!("{text}."),
    }
}

pub fn wants_practical_impact(query: &str) -> bool {
    let lower = query.to_lowercase();
    IMPACT_TRIGGERS.iter().any(|t| lower.contains(t))
}

/// Wraps a `Generator` with the prompt templates and post-processing used for
/// answers.
#[derive(Clone)]
pub struct AnswerGenerator {
    generator: Arc<dyn Generator>,
    params: GenerationParams,
    chars_per_token: f32,
}

impl AnswerGenerator {
    pub fn new(generator: Arc<dyn Generator>, params: GenerationParams, chars_per_token: f32) -> Self {
        Self { generator, params, chars_per_token }
    }

    pub fn from_settings(generator: Arc<dyn Generator>, settings: &GenerationSettings) -> Self {
        Self::new(generator, settings.params(), settings.chars_per_token)
    }

    pub fn context_budget(&self, query: &str) -> usize {
        context_budget(self.generator.context_window_tokens(), self.chars_per_token, query)
    }

    pub fn answer(&self, query: &str, context: &str) -> Result<GeneratedAnswer> {
        let raw = self
            .generator
            .generate(&build_prompt(query, context), &self.params)
            .map_err(RagError::Generation)?;
        let text = complete_sentence(&raw);
        let is_empty = empty::is_empty(&text);
        Ok(GeneratedAnswer { text, is_empty })
    }

    /// Second generation describing practical consequences; empty unless the
    /// query asks about impact.
    pub fn practical_impact(&self, query: &str, context: &str) -> Result<String> {
        if !wants_practical_impact(query) {
            return Ok(String::new());
        }
        self.impact_of(context)
    }

    pub fn impact_of(&self, context: &str) -> Result<String> {
        let prompt = format!(
            "What is the practical impact based on this context?\n\nContext: {}\n\nImpact:",
            truncate_chars(context, IMPACT_CONTEXT_CHARS)
        );
        let params = self.params.with_lengths(IMPACT_MAX_LENGTH, IMPACT_MIN_LENGTH);
        let raw = self.generator.generate(&prompt, &params).map_err(RagError::Generation)?;
        Ok(raw.trim().to_string())
    }
}
