use anyhow::{anyhow, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use insight_core::{Chunk, Embedder, Error, VectorIndex};

use crate::active::{ActiveIndex, IndexStatus};
use crate::flat::FlatIndex;
use crate::snapshot::IndexSnapshot;

const EMBED_BATCH: usize = 32;

/// Builds the clause index from chunks and publishes it to an `ActiveIndex`.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    active: Arc<ActiveIndex>,
    index_dir: Option<PathBuf>,
    show_progress: bool,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>, active: Arc<ActiveIndex>) -> Self {
        Self { embedder, active, index_dir: None, show_progress: false }
    }

    /// Snapshots are written to and restored from `dir`.
    pub fn persist_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn active(&self) -> &Arc<ActiveIndex> { &self.active }

    /// Embeds `chunks`, builds a fresh index and swaps it in. Queries running
    /// meanwhile keep reading the previous index.
    pub fn rebuild(&self, chunks: Vec<Chunk>) -> Result<IndexStatus> {
        if chunks.is_empty() {
            return Err(Error::InvalidConfig("no chunks to index".into()).into());
        }
        let _guard = self.active.rebuild_guard()?;
        let start = Instant::now();
        info!(chunks = chunks.len(), "building clause index");

        let pb = if self.show_progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
                .progress_chars("#>-"),
        );

        let dim = self.embedder.dim();
        let mut index = FlatIndex::new(dim);
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            if vectors.len() != batch.len() {
                return Err(anyhow!("embedder returned {} vectors for {} chunks", vectors.len(), batch.len()));
            }
            for (chunk, vector) in batch.iter().zip(&vectors) {
                index.add(chunk.clone(), vector)?;
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("indexed");

        let index = index.with_created_at(Utc::now());
        if let Some(dir) = &self.index_dir {
            IndexSnapshot::from_index(&index).save(dir)?;
        }
        let status = IndexStatus::of(&index, Some(index.created_at()));
        self.active.replace(Arc::new(index));
        info!(chunks = status.chunks, sources = status.sources.len(), ms = start.elapsed().as_millis() as u64, "clause index ready");
        Ok(status)
    }

    /// Restores the last saved snapshot, if any. Returns `None` when there is
    /// nothing to restore.
    pub fn load_persisted(&self) -> Result<Option<IndexStatus>> {
        let Some(dir) = &self.index_dir else { return Ok(None) };
        if !IndexSnapshot::exists(dir) {
            return Ok(None);
        }
        let index = IndexSnapshot::load(dir)?.into_index()?;
        if index.dim() != self.embedder.dim() {
            warn!(snapshot = index.dim(), embedder = self.embedder.dim(), "snapshot dimension does not match embedder; ignoring it");
            return Ok(None);
        }
        let status = IndexStatus::of(&index, Some(index.created_at()));
        self.active.replace(Arc::new(index));
        Ok(Some(status))
    }

    /// Drops the active index and its snapshot.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.active.rebuild_guard()?;
        self.active.clear();
        if let Some(dir) = &self.index_dir {
            IndexSnapshot::clear(dir)?;
        }
        Ok(())
    }

    pub fn index_dir(&self) -> Option<&Path> { self.index_dir.as_deref() }
}
