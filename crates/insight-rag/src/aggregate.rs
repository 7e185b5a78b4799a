use crate::lexicon::truncate_chars;
use crate::rerank::RerankedResult;

pub const CHUNK_SEPARATOR: &str = "\n\n";

/// Joins the texts of the first `k` results with blank lines and cuts the
/// joined string at `max_chars` characters.
pub fn aggregate(ranked: &[RerankedResult], k: usize, max_chars: usize) -> String {
    let joined = ranked.iter().take(k).map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join(CHUNK_SEPARATOR);
    truncate_chars(&joined, max_chars).to_string()
}
