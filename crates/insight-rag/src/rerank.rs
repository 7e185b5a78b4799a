use insight_core::Chunk;

use crate::answerability;

pub const SIMILARITY_WEIGHT: f32 = 0.7;
pub const ANSWER_WEIGHT: f32 = 0.3;

/// A chunk returned by the index with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RerankedResult {
    pub chunk: Chunk,
    pub similarity: f32,
    pub answer_bonus: f32,
    pub combined_score: f32,
}

pub fn combined_score(similarity: f32, answer_bonus: f32) -> f32 {
    SIMILARITY_WEIGHT * similarity + ANSWER_WEIGHT * answer_bonus
}

/// Re-orders `results` by combined score, descending. Equal scores keep
/// their retrieval order.
pub fn rerank(results: Vec<SearchResult>, query: &str) -> Vec<RerankedResult> {
    let mut reranked: Vec<RerankedResult> = results
        .into_iter()
        .map(|r| {
            let answer_bonus = answerability::score(query, &r.chunk.text);
            RerankedResult { combined_score: combined_score(r.similarity, answer_bonus), answer_bonus, similarity: r.similarity, chunk: r.chunk }
        })
        .collect();
    reranked.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    reranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::ChunkMetadata;

    fn result(i: usize, text: &str, similarity: f32) -> SearchResult {
        SearchResult { chunk: Chunk::new(text, ChunkMetadata { source: "d.txt".into(), page: 1, chunk_id: i }), similarity }
    }

    #[test]
    fn answer_bonus_can_overtake_similarity() {
        let results = vec![
            result(0, "The parties exchange data.", 0.80),
            result(1, "\"Confidential Information\" means any non-public data.", 0.75),
        ];
        let out = rerank(results, "What is Confidential Information?");
        assert_eq!(out[0].chunk.metadata.chunk_id, 1);
        assert!((out[0].combined_score - combined_score(0.75, out[0].answer_bonus)).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_retrieval_order() {
        let results = (0..5).map(|i| result(i, "same text", 0.6)).collect();
        let ids: Vec<usize> = rerank(results, "unrelated").iter().map(|r| r.chunk.metadata.chunk_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }
}
