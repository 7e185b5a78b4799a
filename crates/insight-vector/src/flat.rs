//! Exact inner-product index over L2-normalised vectors.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use insight_core::{Chunk, Error, SearchHit, VectorIndex};

/// Brute-force cosine index. Search cost is linear in the corpus, which is
/// fine for the single-document corpora this engine serves.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    chunks: Vec<Chunk>,
    vectors: Vec<f32>,
    by_id: HashMap<String, usize>,
    created_at: DateTime<Utc>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, chunks: Vec::new(), vectors: Vec::new(), by_id: HashMap::new(), created_at: Utc::now() }
    }

    pub fn from_parts(dim: usize, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::Operation(format!("{} chunks but {} vectors", chunks.len(), vectors.len())).into());
        }
        let mut index = Self::new(dim);
        for (chunk, vector) in chunks.into_iter().zip(vectors) { index.add(chunk, &vector)?; }
        Ok(index)
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn add(&mut self, chunk: Chunk, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::Operation(format!("dim mismatch: got {} expected {}", vector.len(), self.dim)).into());
        }
        if self.by_id.contains_key(&chunk.id) {
            return Err(Error::Operation(format!("duplicate chunk id '{}'", chunk.id)).into());
        }
        self.by_id.insert(chunk.id.clone(), self.chunks.len());
        self.chunks.push(chunk);
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.vectors.get(start..start + self.dim)
    }

    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
}

impl VectorIndex for FlatIndex {
    fn dim(&self) -> usize { self.dim }

    fn chunks(&self) -> &[Chunk] { &self.chunks }

    fn chunk(&self, id: &str) -> Option<&Chunk> { self.by_id.get(id).map(|&i| &self.chunks[i]) }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(Error::Operation(format!("query dim mismatch: got {} expected {}", query.len(), self.dim)).into());
        }
        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .chunks_exact(self.dim.max(1))
            .enumerate()
            .map(|(i, row)| (row.iter().zip(query).map(|(a, b)| a * b).sum::<f32>(), i))
            .collect();
        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, i)| SearchHit { id: self.chunks[i].id.clone(), score })
            .collect())
    }
}
