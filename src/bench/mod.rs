//! Build/search timing and recall comparison across index types
//!
//! Brute force is the ground truth: recall@k for an approximate index is the
//! fraction of the exact top-k ids it also returns, averaged over queries.

use crate::error::Result;
use crate::index::{create_index, IndexOptions, ScoredChunk, VectorIndex};
use crate::math::normalize_vector;
use crate::models::{Chunk, IndexType};
use ahash::{HashSet, HashSetExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchParams {
    pub count: usize,
    pub dimension: usize,
    pub queries: usize,
    pub k: usize,
    pub seed: u64,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            count: 1000,
            dimension: 128,
            queries: 100,
            k: 10,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub index_type: IndexType,
    pub size: usize,
    pub build_ms: f64,
    pub avg_search_us: f64,
    /// Mean recall@k against brute force, 1.0 for brute force itself
    pub recall_at_k: f64,
}

/// Unit-length chunks with reproducible random embeddings
pub fn random_unit_chunks(count: usize, dimension: usize, rng: &mut StdRng) -> Vec<Chunk> {
    (0..count)
        .map(|i| {
            let mut chunk =
                Chunk::with_embedding(Uuid::new_v4(), random_unit_vector(dimension, rng));
            chunk.content = format!("synthetic chunk {}", i);
            chunk
        })
        .collect()
}

fn random_unit_vector(dimension: usize, rng: &mut StdRng) -> Vec<f32> {
    let raw: Vec<f32> = (0..dimension).map(|_| rng.random_range(-1.0..1.0)).collect();
    normalize_vector(&raw)
}

/// Benchmark every index type on the same synthetic data set
pub fn run(params: &BenchParams, options: &IndexOptions) -> Result<Vec<BenchReport>> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let chunks = random_unit_chunks(params.count, params.dimension, &mut rng);
    let queries: Vec<Vec<f32>> = (0..params.queries)
        .map(|_| random_unit_vector(params.dimension, &mut rng))
        .collect();

    tracing::info!(
        "Benchmarking {} vectors x {} dims, {} queries, k={}",
        params.count,
        params.dimension,
        params.queries,
        params.k
    );

    let mut truth: Vec<Vec<ScoredChunk>> = Vec::new();
    let mut reports = Vec::with_capacity(IndexType::ALL.len());
    for index_type in IndexType::ALL {
        let mut index = create_index(index_type, options);

        let started = Instant::now();
        index.build(&chunks)?;
        let build_ms = started.elapsed().as_secs_f64() * 1000.0;

        let (results, avg_search_us) = time_queries(index.as_ref(), &queries, params.k)?;
        if index_type == IndexType::BruteForce {
            truth = results.clone();
        }
        let recall_at_k = mean_recall(&truth, &results);

        tracing::debug!(
            "{}: build {:.2}ms, search {:.1}us, recall {:.3}",
            index_type,
            build_ms,
            avg_search_us,
            recall_at_k
        );
        reports.push(BenchReport {
            index_type,
            size: index.size(),
            build_ms,
            avg_search_us,
            recall_at_k,
        });
    }
    Ok(reports)
}

fn time_queries(
    index: &dyn VectorIndex,
    queries: &[Vec<f32>],
    k: usize,
) -> Result<(Vec<Vec<ScoredChunk>>, f64)> {
    let mut results = Vec::with_capacity(queries.len());
    let started = Instant::now();
    for query in queries {
        results.push(index.search(query, k)?);
    }
    let avg_us = if queries.is_empty() {
        0.0
    } else {
        started.elapsed().as_secs_f64() * 1_000_000.0 / queries.len() as f64
    };
    Ok((results, avg_us))
}

/// Mean over queries of |found ∩ expected| / |expected|
fn mean_recall(expected: &[Vec<ScoredChunk>], found: &[Vec<ScoredChunk>]) -> f64 {
    let mut total = 0.0;
    let mut counted = 0usize;
    for (truth, hits) in expected.iter().zip(found) {
        if truth.is_empty() {
            continue;
        }
        let truth_ids: HashSet<Uuid> = truth.iter().map(|(id, _)| *id).collect();
        let mut matched = HashSet::new();
        for (id, _) in hits {
            if truth_ids.contains(id) {
                matched.insert(*id);
            }
        }
        total += matched.len() as f64 / truth_ids.len() as f64;
        counted += 1;
    }
    if counted == 0 {
        1.0
    } else {
        total / counted as f64
    }
}
