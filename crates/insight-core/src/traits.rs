use crate::generation::GenerationParams;
use crate::types::{Chunk, SearchHit};

/// Text to fixed-length, L2-normalised vector.
pub trait Embedder: Send + Sync {
    /// Loads model weights ahead of the first call; a no-op for stateless embedders.
    fn ensure_loaded(&self) -> anyhow::Result<()> {
        Ok(())
    }
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Read-only nearest-neighbour index over embedded chunks.
pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    fn chunks(&self) -> &[Chunk];
    fn chunk(&self, id: &str) -> Option<&Chunk>;
    /// Up to `k` hits ordered by descending similarity.
    fn search(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>>;

    fn len(&self) -> usize {
        self.chunks().len()
    }

    fn is_empty(&self) -> bool {
        self.chunks().is_empty()
    }
}

/// Prompt to text.
///
/// Implementations own their runtime: `ensure_loaded` performs the one-time
/// model load and is safe to call repeatedly. If the runtime cannot be
/// invoked concurrently the implementation serialises calls itself.
pub trait Generator: Send + Sync {
    fn ensure_loaded(&self) -> anyhow::Result<()>;
    /// Input window of the underlying model, in tokens.
    fn context_window_tokens(&self) -> usize;
    fn generate(&self, prompt: &str, params: &GenerationParams) -> anyhow::Result<String>;
}
