//! Vector indexes
//!
//! Three interchangeable nearest-neighbor algorithms behind one trait:
//! - `BruteForceIndex`: exact linear scan, the correctness baseline
//! - `HnswIndex`: layered proximity graph, approximate
//! - `LshIndex`: random-hyperplane hash tables, approximate
//!
//! Every index learns its dimension from the first embedding it sees unless
//! one was fixed at construction, and rejects mismatched vectors afterwards.
//! `clear` forgets a learned dimension.

mod brute_force;
mod hnsw;
mod lsh;

pub use brute_force::BruteForceIndex;
pub use hnsw::{HnswIndex, HnswStats};
pub use lsh::{LshIndex, LshStats};

use crate::math::{validate_embedding, VectorError};
use crate::models::{Chunk, IndexType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error("Unknown index type: {0}")]
    UnknownIndexType(String),
}

/// A ranked hit: chunk id and cosine similarity, higher is closer
pub type ScoredChunk = (Uuid, f32);

/// Common contract of all index variants.
///
/// `search` never mutates and returns at most `k` hits sorted by score
/// descending. An empty index yields no hits rather than an error.
pub trait VectorIndex: Send + Sync {
    fn index_type(&self) -> IndexType;

    /// Replace everything indexed with `chunks`.
    ///
    /// All embeddings are validated before any state changes, so a failed
    /// build leaves the previous contents in place.
    fn build(&mut self, chunks: &[Chunk]) -> Result<(), IndexError>;

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Insert one chunk. Re-adding an indexed id replaces the old entry.
    fn add(&mut self, chunk: &Chunk) -> Result<(), IndexError>;

    /// Remove a chunk; absent ids are ignored.
    fn remove(&mut self, chunk_id: Uuid);

    fn size(&self) -> usize;

    fn clear(&mut self);

    /// Established dimension, if any vector or a fixed dimension set it
    fn dimension(&self) -> Option<usize>;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// HNSW tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HnswParams {
    /// Max neighbors per node on layers >= 1 (layer 0 allows twice as many)
    pub m: usize,
    /// Candidate list size while inserting
    pub ef_construction: usize,
    /// Candidate list size while querying
    pub ef_search: usize,
    /// Seed for layer assignment, random when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            seed: None,
        }
    }
}

/// LSH tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LshParams {
    /// Number of independent hash tables (L)
    pub num_tables: usize,
    /// Hyperplanes per table (k), at most 64
    pub num_hyperplanes: usize,
    /// Seed for hyperplane generation, random when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            num_tables: 10,
            num_hyperplanes: 16,
            seed: None,
        }
    }
}

/// Everything needed to construct any index variant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOptions {
    /// Fixed dimension; learned from the first vector when `None`
    pub dimension: Option<usize>,
    pub hnsw: HnswParams,
    pub lsh: LshParams,
}

/// Construct an empty index of the requested type
pub fn create_index(index_type: IndexType, options: &IndexOptions) -> Box<dyn VectorIndex> {
    tracing::debug!("Creating {} index", index_type);
    match index_type {
        IndexType::BruteForce => Box::new(BruteForceIndex::new(options.dimension)),
        IndexType::Hnsw => Box::new(HnswIndex::new(options.hnsw.clone(), options.dimension)),
        IndexType::Lsh => Box::new(LshIndex::new(options.lsh.clone(), options.dimension)),
    }
}

/// Construct an index from its configured name, failing on unknown names
pub fn create_index_by_name(
    name: &str,
    options: &IndexOptions,
) -> Result<Box<dyn VectorIndex>, IndexError> {
    let index_type: IndexType = name.parse()?;
    Ok(create_index(index_type, options))
}

/// Dimension bookkeeping shared by the index variants
#[derive(Debug, Clone)]
pub(crate) struct DimensionGuard {
    initial: Option<usize>,
    current: Option<usize>,
}

impl DimensionGuard {
    pub(crate) fn new(dimension: Option<usize>) -> Self {
        Self {
            initial: dimension,
            current: dimension,
        }
    }

    pub(crate) fn get(&self) -> Option<usize> {
        self.current
    }

    /// Check `embedding`, adopting its length if no dimension is set yet
    pub(crate) fn admit(&mut self, embedding: &[f32]) -> Result<usize, IndexError> {
        match self.current {
            Some(expected) => {
                check_dimension(expected, embedding)?;
                Ok(expected)
            }
            None => {
                self.current = Some(embedding.len());
                Ok(embedding.len())
            }
        }
    }

    /// Dimension a bulk build would settle on, without mutating.
    ///
    /// Starts from the construction-time dimension, as a build replaces
    /// all prior state.
    pub(crate) fn plan_build(&self, chunks: &[Chunk]) -> Result<Option<usize>, IndexError> {
        let mut dimension = self.initial;
        for chunk in chunks.iter().filter(|c| c.has_embedding()) {
            match dimension {
                Some(expected) => check_dimension(expected, &chunk.embedding)?,
                None => dimension = Some(chunk.embedding.len()),
            }
        }
        Ok(dimension)
    }

    pub(crate) fn set(&mut self, dimension: Option<usize>) {
        self.current = dimension;
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.initial;
    }
}

pub(crate) fn check_dimension(expected: usize, embedding: &[f32]) -> Result<(), IndexError> {
    validate_embedding(embedding, expected).map_err(|e| match e {
        VectorError::DimensionMismatch { left, right } => IndexError::DimensionMismatch {
            expected: left,
            actual: right,
        },
        other => IndexError::Vector(other),
    })
}

/// Sort hits best-first and keep the top `k`.
pub(crate) fn rank(mut hits: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    hits.sort_by(|a, b| b.1.total_cmp(&a.1));
    hits.truncate(k);
    hits
}

/// Like `rank`, but breaks score ties by id for inputs with no stable order.
pub(crate) fn rank_by_id(mut hits: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    hits.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    hits.truncate(k);
    hits
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn options() -> IndexOptions {
        IndexOptions {
            dimension: None,
            hnsw: HnswParams {
                seed: Some(7),
                ..HnswParams::default()
            },
            lsh: LshParams {
                num_tables: 8,
                num_hyperplanes: 4,
                seed: Some(7),
            },
        }
    }

    #[test]
    fn test_create_index_by_name() {
        let index = create_index_by_name("hnsw", &options()).unwrap();
        assert_eq!(index.index_type(), IndexType::Hnsw);
        assert!(index.is_empty());

        let err = create_index_by_name("faiss", &options()).err().unwrap();
        assert_eq!(err, IndexError::UnknownIndexType("faiss".to_string()));
    }

    #[test]
    fn test_common_contract_across_variants() {
        let chunks = random_chunks(40, 8, 3);
        let query = chunks[5].embedding.clone();

        for index_type in IndexType::ALL {
            let mut index = create_index(index_type, &options());
            assert!(index.search(&query, 5).unwrap().is_empty());

            index.build(&chunks).unwrap();
            assert_eq!(index.size(), 40, "{}", index_type);
            assert_eq!(index.dimension(), Some(8));

            for k in [1, 3, 10, 100] {
                let hits = index.search(&query, k).unwrap();
                assert!(hits.len() <= k);
                assert_sorted(&hits);
            }

            // Wrong-length add leaves size unchanged
            let err = index.add(&chunk(vec![1.0; 3])).unwrap_err();
            assert_eq!(
                err,
                IndexError::DimensionMismatch {
                    expected: 8,
                    actual: 3
                }
            );
            assert_eq!(index.size(), 40);

            // Removing an unknown id is a no-op
            index.remove(Uuid::new_v4());
            assert_eq!(index.size(), 40);

            index.remove(chunks[0].id);
            assert_eq!(index.size(), 39);

            index.clear();
            assert_eq!(index.size(), 0);
            assert_eq!(index.dimension(), None);
            assert!(index.search(&query, 5).unwrap().is_empty());

            // A cleared index re-learns a different dimension
            index.add(&chunk(vec![1.0, 0.0])).unwrap();
            assert_eq!(index.dimension(), Some(2));
        }
    }

    #[test]
    fn test_empty_query_rejected_by_every_variant() {
        let chunks = random_chunks(12, 4, 9);
        for index_type in IndexType::ALL {
            let mut index = create_index(index_type, &options());
            index.build(&chunks).unwrap();
            assert_eq!(
                index.search(&[], 3).unwrap_err(),
                IndexError::Vector(VectorError::Empty),
                "{}",
                index_type
            );
        }
    }

    #[test]
    fn test_failed_build_keeps_previous_contents() {
        let good = random_chunks(10, 4, 1);
        let mut bad = random_chunks(3, 4, 2);
        bad.push(chunk(vec![1.0; 5]));

        for index_type in IndexType::ALL {
            let mut index = create_index(index_type, &options());
            index.build(&good).unwrap();
            assert!(index.build(&bad).is_err());
            assert_eq!(index.size(), 10, "{}", index_type);
        }
    }

    #[test]
    fn test_mismatched_query_is_rejected() {
        for index_type in IndexType::ALL {
            let mut index = create_index(index_type, &options());
            index.build(&random_chunks(5, 4, 9)).unwrap();
            assert!(matches!(
                index.search(&[1.0, 0.0], 3),
                Err(IndexError::DimensionMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_rank_truncates_and_orders() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let ranked = rank(vec![(a, 0.1), (b, 0.9), (c, 0.5)], 2);
        assert_eq!(ranked, vec![(b, 0.9), (c, 0.5)]);
    }
}
