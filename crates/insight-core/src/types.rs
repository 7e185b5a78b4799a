//! Domain types shared by the indexing and answering paths.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Provenance of a chunk inside its source document.
///
/// - `source`: file name of the document the chunk was cut from
/// - `page`: 1-based page number within the source
/// - `chunk_id`: position of the chunk within its page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
    pub chunk_id: usize,
}

/// A contiguous fragment of a source document. Immutable once indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        let id = format!("{}:{}:{}", metadata.source, metadata.page, metadata.chunk_id);
        Self { id, text: text.into(), metadata }
    }
}

/// The minimal surface returned by a vector index.
///
/// `id` matches `Chunk::id`. `score` is the cosine similarity between the
/// query and the chunk vector; higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
}
