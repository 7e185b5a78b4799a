//! On-disk persistence of a built index as a single JSON document.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use insight_core::{Chunk, Error, VectorIndex};

use crate::flat::FlatIndex;

pub const SNAPSHOT_FILE: &str = "clauses.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub dim: usize,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<SnapshotEntry>,
}

impl IndexSnapshot {
    pub fn path(dir: &Path) -> PathBuf { dir.join(SNAPSHOT_FILE) }

    pub fn exists(dir: &Path) -> bool { Self::path(dir).is_file() }

    pub fn from_index(index: &FlatIndex) -> Self {
        let entries = index
            .chunks()
            .iter()
            .enumerate()
            .map(|(i, chunk)| SnapshotEntry { chunk: chunk.clone(), vector: index.vector(i).map(<[f32]>::to_vec).unwrap_or_default() })
            .collect();
        Self { dim: index.dim(), created_at: index.created_at(), entries }
    }

    pub fn into_index(self) -> Result<FlatIndex> {
        let (chunks, vectors): (Vec<Chunk>, Vec<Vec<f32>>) = self.entries.into_iter().map(|e| (e.chunk, e.vector)).unzip();
        Ok(FlatIndex::from_parts(self.dim, chunks, vectors)?.with_created_at(self.created_at))
    }

    /// Writes to a temporary file in `dir` and renames it over the previous
    /// snapshot, so a crash never leaves a truncated index behind.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let target = Self::path(dir);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.persist(&target).map_err(|e| e.error)?;
        info!(path = %target.display(), chunks = self.entries.len(), "index snapshot saved");
        Ok(target)
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::path(dir);
        if !path.is_file() {
            return Err(Error::NotFound(format!("index snapshot {}", path.display())).into());
        }
        let file = fs::File::open(&path)?;
        let snapshot: Self = serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parsing {}", path.display()))?;
        debug!(path = %path.display(), chunks = snapshot.entries.len(), "index snapshot loaded");
        Ok(snapshot)
    }

    /// Removes the snapshot; returns whether one existed.
    pub fn clear(dir: &Path) -> Result<bool> {
        let path = Self::path(dir);
        if path.is_file() {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "deleted old index snapshot");
            return Ok(true);
        }
        Ok(false)
    }
}
