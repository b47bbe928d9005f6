//! Random-hyperplane locality-sensitive hashing
//!
//! `L` tables, each with `k` random unit hyperplanes. A vector's signature in
//! a table has bit `i` set when its dot product with hyperplane `i` is
//! non-negative. Queries gather every id sharing a bucket with the query in
//! any table, then re-rank that union by exact cosine similarity. Vectors
//! that never collide with the query are missed.

use super::{
    check_dimension, rank_by_id, DimensionGuard, IndexError, LshParams, ScoredChunk, VectorIndex,
};
use crate::math::{cosine_similarity, normalize_vector};
use crate::models::{Chunk, IndexType};
use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

const MAX_HYPERPLANES: usize = u64::BITS as usize;

type Signature = u64;

struct HashTable {
    hyperplanes: Vec<Vec<f32>>,
    buckets: HashMap<Signature, Vec<Uuid>>,
}

impl HashTable {
    fn random(rng: &mut StdRng, num_hyperplanes: usize, dimension: usize) -> Self {
        let hyperplanes = (0..num_hyperplanes)
            .map(|_| {
                let raw: Vec<f32> = (0..dimension).map(|_| standard_normal(rng) as f32).collect();
                normalize_vector(&raw)
            })
            .collect();
        Self {
            hyperplanes,
            buckets: HashMap::new(),
        }
    }

    fn signature(&self, vector: &[f32]) -> Signature {
        self.hyperplanes
            .iter()
            .enumerate()
            .fold(0, |sig, (bit, plane)| {
                let dot: f64 = plane
                    .iter()
                    .zip(vector)
                    .map(|(p, v)| f64::from(*p) * f64::from(*v))
                    .sum();
                if dot >= 0.0 {
                    sig | (1 << bit)
                } else {
                    sig
                }
            })
    }

    fn insert(&mut self, id: Uuid, vector: &[f32]) {
        let sig = self.signature(vector);
        let bucket = self.buckets.entry(sig).or_default();
        if !bucket.contains(&id) {
            bucket.push(id);
        }
    }

    fn remove(&mut self, id: Uuid, vector: &[f32]) {
        let sig = self.signature(vector);
        if let Some(bucket) = self.buckets.get_mut(&sig) {
            bucket.retain(|c| *c != id);
            if bucket.is_empty() {
                self.buckets.remove(&sig);
            }
        }
    }
}

/// Standard normal sample via Box-Muller
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Bucket occupancy summary
#[derive(Debug, Clone, PartialEq)]
pub struct LshStats {
    pub vectors: usize,
    /// Non-empty buckets per table
    pub buckets_per_table: Vec<usize>,
    /// Largest bucket across all tables
    pub max_bucket: usize,
}

pub struct LshIndex {
    params: LshParams,
    tables: Vec<HashTable>,
    vectors: HashMap<Uuid, Vec<f32>>,
    dimension: DimensionGuard,
    rng: StdRng,
}

impl LshIndex {
    pub fn new(mut params: LshParams, dimension: Option<usize>) -> Self {
        if params.num_hyperplanes == 0 || params.num_hyperplanes > MAX_HYPERPLANES {
            let clamped = params.num_hyperplanes.clamp(1, MAX_HYPERPLANES);
            tracing::warn!(
                "LSH num_hyperplanes {} out of range, using {}",
                params.num_hyperplanes,
                clamped
            );
            params.num_hyperplanes = clamped;
        }
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            params,
            tables: Vec::new(),
            vectors: HashMap::new(),
            dimension: DimensionGuard::new(dimension),
            rng,
        }
    }

    pub fn params(&self) -> &LshParams {
        &self.params
    }

    pub fn stats(&self) -> LshStats {
        LshStats {
            vectors: self.vectors.len(),
            buckets_per_table: self.tables.iter().map(|t| t.buckets.len()).collect(),
            max_bucket: self
                .tables
                .iter()
                .flat_map(|t| t.buckets.values().map(Vec::len))
                .max()
                .unwrap_or(0),
        }
    }

    fn generate_tables(&mut self, dimension: usize) {
        let mut tables = Vec::with_capacity(self.params.num_tables);
        for _ in 0..self.params.num_tables {
            tables.push(HashTable::random(
                &mut self.rng,
                self.params.num_hyperplanes,
                dimension,
            ));
        }
        self.tables = tables;
        tracing::trace!(
            "Generated {} LSH tables x {} hyperplanes at dimension {}",
            self.params.num_tables,
            self.params.num_hyperplanes,
            dimension
        );
    }

    fn insert(&mut self, id: Uuid, embedding: &[f32]) {
        for table in &mut self.tables {
            table.insert(id, embedding);
        }
        self.vectors.insert(id, embedding.to_vec());
    }
}

impl VectorIndex for LshIndex {
    fn index_type(&self) -> IndexType {
        IndexType::Lsh
    }

    fn build(&mut self, chunks: &[Chunk]) -> Result<(), IndexError> {
        let dimension = self.dimension.plan_build(chunks)?;

        self.tables.clear();
        self.vectors.clear();
        self.dimension.set(dimension);

        let Some(dimension) = dimension else {
            return Ok(());
        };
        self.generate_tables(dimension);
        for chunk in chunks.iter().filter(|c| c.has_embedding()) {
            if let Some(old) = self.vectors.remove(&chunk.id) {
                for table in &mut self.tables {
                    table.remove(chunk.id, &old);
                }
            }
            self.insert(chunk.id, &chunk.embedding);
        }

        tracing::debug!(
            "LSH index built with {} vectors across {} tables",
            self.vectors.len(),
            self.tables.len()
        );
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.vectors.is_empty() || self.tables.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimension.get() {
            check_dimension(expected, query)?;
        }

        let mut candidates: HashSet<Uuid> = HashSet::new();
        for table in &self.tables {
            if let Some(bucket) = table.buckets.get(&table.signature(query)) {
                candidates.extend(bucket.iter().copied());
            }
        }

        let mut hits = Vec::with_capacity(candidates.len());
        for id in candidates {
            if let Some(embedding) = self.vectors.get(&id) {
                hits.push((id, cosine_similarity(query, embedding)?));
            }
        }
        Ok(rank_by_id(hits, k))
    }

    fn add(&mut self, chunk: &Chunk) -> Result<(), IndexError> {
        if !chunk.has_embedding() {
            return Ok(());
        }
        let dimension = self.dimension.admit(&chunk.embedding)?;
        if self.tables.is_empty() {
            self.generate_tables(dimension);
        }

        self.remove(chunk.id);
        self.insert(chunk.id, &chunk.embedding);
        Ok(())
    }

    fn remove(&mut self, chunk_id: Uuid) {
        let Some(embedding) = self.vectors.remove(&chunk_id) else {
            return;
        };
        for table in &mut self.tables {
            table.remove(chunk_id, &embedding);
        }
    }

    fn size(&self) -> usize {
        self.vectors.len()
    }

    fn clear(&mut self) {
        self.tables.clear();
        self.vectors.clear();
        self.dimension.reset();
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension.get()
    }
}
