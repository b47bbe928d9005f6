//! Exact k-NN by linear scan
//!
//! Build O(n), search O(n·d), remove O(n). Deterministic: ties keep
//! insertion order.

use super::{check_dimension, rank, DimensionGuard, IndexError, ScoredChunk, VectorIndex};
use crate::math::cosine_similarity;
use crate::models::{Chunk, IndexType};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Entry {
    id: Uuid,
    /// May be empty; such entries count toward `size` but never match
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct BruteForceIndex {
    entries: Vec<Entry>,
    dimension: DimensionGuard,
}

impl BruteForceIndex {
    pub fn new(dimension: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            dimension: DimensionGuard::new(dimension),
        }
    }
}

impl Default for BruteForceIndex {
    fn default() -> Self {
        Self::new(None)
    }
}

impl VectorIndex for BruteForceIndex {
    fn index_type(&self) -> IndexType {
        IndexType::BruteForce
    }

    fn build(&mut self, chunks: &[Chunk]) -> Result<(), IndexError> {
        let dimension = self.dimension.plan_build(chunks)?;

        self.entries = chunks
            .iter()
            .map(|c| Entry {
                id: c.id,
                embedding: c.embedding.clone(),
            })
            .collect();
        self.dimension.set(dimension);

        tracing::debug!("Brute-force index built with {} chunks", self.entries.len());
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimension.get() {
            check_dimension(expected, query)?;
        }

        let mut hits = Vec::with_capacity(self.entries.len());
        for entry in self.entries.iter().filter(|e| !e.embedding.is_empty()) {
            hits.push((entry.id, cosine_similarity(query, &entry.embedding)?));
        }

        Ok(rank(hits, k))
    }

    fn add(&mut self, chunk: &Chunk) -> Result<(), IndexError> {
        if chunk.has_embedding() {
            self.dimension.admit(&chunk.embedding)?;
        }

        self.entries.retain(|e| e.id != chunk.id);
        self.entries.push(Entry {
            id: chunk.id,
            embedding: chunk.embedding.clone(),
        });
        Ok(())
    }

    fn remove(&mut self, chunk_id: Uuid) {
        self.entries.retain(|e| e.id != chunk_id);
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.dimension.reset();
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::*;

    fn scenario() -> (BruteForceIndex, Vec<Chunk>) {
        let chunks = vec![
            chunk(vec![1.0, 0.0, 0.0, 0.0]),
            chunk(vec![0.0, 1.0, 0.0, 0.0]),
            chunk(vec![0.9, 0.1, 0.0, 0.0]),
        ];
        let mut index = BruteForceIndex::default();
        index.build(&chunks).unwrap();
        (index, chunks)
    }

    #[test]
    fn test_top_two_scenario() {
        let (index, chunks) = scenario();
        let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, chunks[0].id);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].0, chunks[2].id);
        assert!((hits[1].1 - 0.994).abs() < 1e-3);
        assert!(hits.iter().all(|(id, _)| *id != chunks[1].id));
    }

    #[test]
    fn test_deterministic_results() {
        let chunks = random_chunks(50, 16, 11);
        let mut index = BruteForceIndex::default();
        index.build(&chunks).unwrap();

        let query = random_chunks(1, 16, 12).remove(0).embedding;
        let first = index.search(&query, 10).unwrap();
        for _ in 0..5 {
            assert_eq!(index.search(&query, 10).unwrap(), first);
        }
    }

    #[test]
    fn test_self_similarity_first() {
        let chunks = random_chunks(30, 12, 5);
        let mut index = BruteForceIndex::default();
        index.build(&chunks).unwrap();

        for c in &chunks {
            let hits = index.search(&c.embedding, 1).unwrap();
            assert_eq!(hits[0].0, c.id);
            assert!((hits[0].1 - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_k_larger_than_size() {
        let (index, _) = scenario();
        assert_eq!(index.search(&[0.0, 0.0, 1.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_embedding_less_chunks_stored_but_unmatched() {
        let mut chunks = random_chunks(3, 4, 1);
        chunks.push(chunk(Vec::new()));

        let mut index = BruteForceIndex::default();
        index.build(&chunks).unwrap();
        assert_eq!(index.size(), 4);

        let hits = index.search(&chunks[0].embedding, 10).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|(id, _)| *id != chunks[3].id));
    }

    #[test]
    fn test_add_and_remove() {
        let (mut index, chunks) = scenario();

        let extra = chunk(vec![0.0, 0.0, 0.0, 1.0]);
        index.add(&extra).unwrap();
        assert_eq!(index.size(), 4);
        assert_eq!(index.search(&[0.0, 0.0, 0.0, 1.0], 1).unwrap()[0].0, extra.id);

        // Re-adding replaces rather than duplicates
        index.add(&extra).unwrap();
        assert_eq!(index.size(), 4);

        index.remove(chunks[0].id);
        assert_eq!(index.size(), 3);
        let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].0, chunks[2].id);
    }

    #[test]
    fn test_fixed_dimension_rejects_build() {
        let mut index = BruteForceIndex::new(Some(8));
        let err = index.build(&random_chunks(2, 4, 1)).unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                expected: 8,
                actual: 4
            }
        );
        assert_eq!(index.size(), 0);

        index.clear();
        assert_eq!(index.dimension(), Some(8));
    }
}
