//! Shared building blocks for the clause insight engine: domain types,
//! capability traits, configuration and document chunking.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod generation;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use generation::{GenerationParams, Strategy};
pub use traits::{Embedder, Generator, VectorIndex};
pub use types::{Chunk, ChunkId, ChunkMetadata, SearchHit};
