//! Chunkdex - vector similarity search over embedded text chunks
//!
//! Libraries hold documents, documents hold chunks, and each library is
//! searched through one of three interchangeable indexes (brute force, HNSW,
//! LSH). Shared state is guarded by a writer-priority reader-writer lock.

pub mod bench;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod index;
pub mod math;
pub mod models;
pub mod repository;
pub mod search;

pub use error::{ChunkdexError, Result};
pub use index::{create_index, IndexError, IndexOptions, VectorIndex};
pub use models::{Chunk, Document, IndexType, Library};
pub use search::{SearchRequest, SearchResult, SearchService};
