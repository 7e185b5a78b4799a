use anyhow::Result;

use insight_core::{GenerationParams, Generator};

pub const NO_INFORMATION: &str = "The context does not contain information about that.";

const STOPWORDS: &[&str] = &[
    "what", "which", "when", "where", "does", "this", "that", "with", "from", "have", "there", "their", "about",
    "would", "could", "should", "under", "into", "they", "them", "than", "then", "will", "your",
];

/// Deterministic extractive stand-in for a generation model.
///
/// With a `Question:` in the prompt it returns the context sentences sharing
/// the most words with the question, in context order; without one it returns
/// the opening sentences of the context.
#[derive(Debug, Clone)]
pub struct FakeGenerator {
    window: usize,
    max_sentences: usize,
}

impl Default for FakeGenerator {
    fn default() -> Self { Self { window: 512, max_sentences: 2 } }
}

impl FakeGenerator {
    pub fn new(window: usize) -> Self { Self { window, ..Self::default() } }

    fn answer(&self, prompt: &str, max_words: usize) -> String {
        let context = section_after(prompt, "Context:").unwrap_or_default();
        let sentences = split_sentences(&context);
        let picked: Vec<&str> = match section_after(prompt, "Question:") {
            Some(question) => {
                let words = content_words(&question);
                let mut scored: Vec<(usize, usize)> = sentences
                    .iter()
                    .enumerate()
                    .map(|(i, s)| {
                        let lower = s.to_lowercase();
                        (words.iter().filter(|w| lower.contains(w.as_str())).count(), i)
                    })
                    .filter(|(hits, _)| *hits > 0)
                    .collect();
                scored.sort_by(|a, b| b.0.cmp(&a.0));
                let mut keep: Vec<usize> = scored.into_iter().take(self.max_sentences).map(|(_, i)| i).collect();
                keep.sort_unstable();
                keep.into_iter().map(|i| sentences[i]).collect()
            }
            None => sentences.iter().copied().take(self.max_sentences).collect(),
        };
        if picked.is_empty() {
            return NO_INFORMATION.to_string();
        }
        let joined = picked.join(" ");
        let words: Vec<&str> = joined.split_whitespace().collect();
        if words.len() > max_words.max(1) { words[..max_words.max(1)].join(" ") } else { joined }
    }
}

impl Generator for FakeGenerator {
    fn ensure_loaded(&self) -> Result<()> { Ok(()) }

    fn context_window_tokens(&self) -> usize { self.window }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        Ok(self.answer(prompt, params.max_length))
    }
}

/// Text following `label` up to the next blank line, or for `Context:` up to
/// the trailing instruction.
fn section_after(prompt: &str, label: &str) -> Option<String> {
    let start = prompt.find(label)? + label.len();
    let rest = &prompt[start..];
    let body = if label == "Context:" {
        match rest.rfind("\n\n") {
            Some(end) if rest[end..].trim_end().ends_with(':') => &rest[..end],
            _ => rest,
        }
    } else {
        rest.split("\n\n").next().unwrap_or(rest)
    };
    let body = body.trim();
    (!body.is_empty()).then(|| body.to_string())
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        let terminal = matches!(b, b'.' | b'!' | b'?') && bytes.get(i + 1).map_or(true, |n| n.is_ascii_whitespace());
        if terminal || b == b'\n' {
            let end = if b == b'\n' { i } else { i + 1 };
            let s = text[start..end].trim();
            if !s.is_empty() {
                out.push(s);
            }
            start = i + 1;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn content_words(question: &str) -> Vec<String> {
    question
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(question: &str, context: &str) -> String {
        format!("Answer the question.\n\nQuestion: {question}\n\nContext:\n{context}\n\nComplete answer:")
    }

    #[test]
    fn picks_sentences_sharing_question_words() {
        let g = FakeGenerator::default();
        let out = g
            .generate(
                &prompt("How can this agreement be terminated?", "TERMINATION. Either party may terminate this agreement with 30 days notice."),
                &GenerationParams::default(),
            )
            .unwrap();
        assert_eq!(out, "Either party may terminate this agreement with 30 days notice.");
    }

    #[test]
    fn unrelated_question_yields_no_information() {
        let g = FakeGenerator::default();
        let out = g.generate(&prompt("Who pays shipping?", "Rent is due monthly."), &GenerationParams::default()).unwrap();
        assert_eq!(out, NO_INFORMATION);
    }

    #[test]
    fn prompt_without_question_summarises_opening() {
        let g = FakeGenerator::default();
        let p = "What is the practical impact based on this context?\n\nContext: One. Two. Three.\n\nImpact:";
        assert_eq!(g.generate(p, &GenerationParams::default()).unwrap(), "One. Two.");
    }

    #[test]
    fn sentence_split_keeps_decimals_together() {
        assert_eq!(split_sentences("Pay 1.5 percent. Then stop."), vec!["Pay 1.5 percent.", "Then stop."]);
    }
}
