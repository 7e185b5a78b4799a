//! Parameters understood by every text-generation capability.

use serde::{Deserialize, Serialize};

/// Decoding strategy used by a generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Strategy {
    /// Temperature + nucleus sampling. Longer, less reproducible output.
    Sampling { temperature: f64, top_p: f64 },
    /// Beam search. Stable output, the production default.
    Beam { num_beams: usize, early_stopping: bool },
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Beam { num_beams: 4, early_stopping: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on generated tokens.
    pub max_length: usize,
    /// End-of-sequence is suppressed until this many tokens exist.
    pub min_length: usize,
    pub strategy: Strategy,
    pub repetition_penalty: f32,
    pub seed: u64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: 600,
            min_length: 50,
            strategy: Strategy::default(),
            repetition_penalty: 1.2,
            seed: 299_792_458,
        }
    }
}

impl GenerationParams {
    /// Same decoding strategy with different length bounds.
    pub fn with_lengths(&self, max_length: usize, min_length: usize) -> Self {
        Self { max_length, min_length, ..self.clone() }
    }
}
