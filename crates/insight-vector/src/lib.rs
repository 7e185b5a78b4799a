//! Clause index: an exact cosine index over chunk embeddings, a swappable
//! process-wide slot for it, and JSON snapshots on disk.

pub mod active;
pub mod flat;
pub mod snapshot;
pub mod writer;

pub use active::{ActiveIndex, IndexStatus, SharedIndex};
pub use flat::FlatIndex;
pub use snapshot::{IndexSnapshot, SnapshotEntry, SNAPSHOT_FILE};
pub use writer::Indexer;
