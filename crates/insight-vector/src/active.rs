//! The process-wide slot holding the index that queries read from.
//!
//! Readers clone the `Arc` under a short read lock and then search without
//! holding any lock. A rebuild constructs the new index off to the side and
//! swaps it in under the write lock, so readers never observe a half-built
//! index. Rebuilds are serialised by their own mutex.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use insight_core::VectorIndex;

pub type SharedIndex = Arc<dyn VectorIndex>;

#[derive(Default)]
pub struct ActiveIndex {
    slot: RwLock<Option<SharedIndex>>,
    rebuild: Mutex<()>,
}

impl ActiveIndex {
    pub fn empty() -> Self { Self::default() }

    pub fn with_index(index: SharedIndex) -> Self {
        Self { slot: RwLock::new(Some(index)), rebuild: Mutex::new(()) }
    }

    /// The index queries should use, or `None` if nothing has been built yet.
    pub fn current(&self) -> Option<SharedIndex> {
        match self.slot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_ready(&self) -> bool { self.current().is_some() }

    /// Atomically installs `index`, returning the one it replaced.
    pub fn replace(&self, index: SharedIndex) -> Option<SharedIndex> {
        let mut guard = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.replace(index)
    }

    pub fn clear(&self) -> Option<SharedIndex> {
        let mut guard = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take()
    }

    /// Held for the whole duration of a rebuild.
    pub fn rebuild_guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.rebuild.lock().map_err(|_| anyhow!("index rebuild lock poisoned"))
    }
}

/// Health summary of an index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub ready: bool,
    pub chunks: usize,
    pub sources: Vec<String>,
    pub pages: usize,
    pub created_at: Option<DateTime<Utc>>,
}

impl IndexStatus {
    pub fn not_ready() -> Self {
        Self { ready: false, chunks: 0, sources: Vec::new(), pages: 0, created_at: None }
    }

    pub fn of(index: &dyn VectorIndex, created_at: Option<DateTime<Utc>>) -> Self {
        let sources: BTreeSet<&str> = index.chunks().iter().map(|c| c.metadata.source.as_str()).collect();
        let pages: BTreeSet<(&str, u32)> = index.chunks().iter().map(|c| (c.metadata.source.as_str(), c.metadata.page)).collect();
        Self {
            ready: true,
            chunks: index.len(),
            sources: sources.into_iter().map(String::from).collect(),
            pages: pages.len(),
            created_at,
        }
    }
}
