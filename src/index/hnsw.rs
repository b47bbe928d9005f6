//! Hierarchical Navigable Small World graph
//!
//! Nodes live in an arena addressed by slot number. Layer 0 holds every node
//! with up to `2M` links, higher layers are sparser with up to `M`. Searches
//! descend greedily from the entry point and widen to `ef` candidates on the
//! base layer.
//!
//! Removal unlinks the node but does not add replacement edges, so heavy
//! churn degrades connectivity and recall. A removed slot is scrubbed from
//! every link list in the graph and then put on a free list, so the next
//! insert reuses it and the arena stays as large as the peak live count.

use super::{
    check_dimension, rank, DimensionGuard, HnswParams, IndexError, ScoredChunk, VectorIndex,
};
use crate::math::cosine_similarity;
use crate::models::{Chunk, IndexType};
use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Node {
    id: Uuid,
    embedding: Vec<f32>,
    /// Links per layer, `links[l]` for `l` in `0..=level`
    links: Vec<Vec<usize>>,
}

impl Node {
    fn level(&self) -> usize {
        self.links.len() - 1
    }
}

/// Heap entry ordered by distance (`1 - cosine`), ties by slot
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    slot: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.slot.cmp(&other.slot))
    }
}

/// Graph shape summary
#[derive(Debug, Clone, PartialEq)]
pub struct HnswStats {
    pub nodes: usize,
    /// Vacant slots waiting to be reused
    pub tombstones: usize,
    pub top_layer: Option<usize>,
    pub entry_point: Option<Uuid>,
    pub mean_base_degree: f64,
}

pub struct HnswIndex {
    params: HnswParams,
    nodes: Vec<Option<Node>>,
    slots: HashMap<Uuid, usize>,
    /// Vacant arena slots, reused before the arena grows
    free: Vec<usize>,
    entry_point: Option<usize>,
    dimension: DimensionGuard,
    rng: StdRng,
}

impl HnswIndex {
    pub fn new(params: HnswParams, dimension: Option<usize>) -> Self {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            params,
            nodes: Vec::new(),
            slots: HashMap::new(),
            free: Vec::new(),
            entry_point: None,
            dimension: DimensionGuard::new(dimension),
            rng,
        }
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    pub fn stats(&self) -> HnswStats {
        let live: Vec<&Node> = self.nodes.iter().flatten().collect();
        let base_links: usize = live.iter().map(|n| n.links[0].len()).sum();
        HnswStats {
            nodes: live.len(),
            tombstones: self.free.len(),
            top_layer: self.top_layer(),
            entry_point: self.entry_point.and_then(|s| self.node(s)).map(|n| n.id),
            mean_base_degree: if live.is_empty() {
                0.0
            } else {
                base_links as f64 / live.len() as f64
            },
        }
    }

    /// Ids linked to `chunk_id` on `layer`, if the node reaches that layer
    pub fn neighbors(&self, chunk_id: Uuid, layer: usize) -> Option<Vec<Uuid>> {
        let node = self.node(*self.slots.get(&chunk_id)?)?;
        let links = node.links.get(layer)?;
        Some(
            links
                .iter()
                .filter_map(|&s| self.node(s))
                .map(|n| n.id)
                .collect(),
        )
    }

    fn node(&self, slot: usize) -> Option<&Node> {
        self.nodes.get(slot).and_then(Option::as_ref)
    }

    fn top_layer(&self) -> Option<usize> {
        self.entry_point.and_then(|s| self.node(s)).map(Node::level)
    }

    fn layer_cap(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.m * 2
        } else {
            self.params.m
        }
    }

    /// `floor(-ln(u) * mL)` with `u` uniform on `(0, 1]` and `mL = 1/ln(M)`
    fn random_level(&mut self) -> usize {
        let u = 1.0 - self.rng.random::<f64>();
        let ml = if self.params.m > 1 {
            1.0 / (self.params.m as f64).ln()
        } else {
            1.0
        };
        (-u.ln() * ml).floor() as usize
    }

    fn distance(&self, query: &[f32], slot: usize) -> Option<f32> {
        let node = self.node(slot)?;
        cosine_similarity(query, &node.embedding)
            .ok()
            .map(|similarity| 1.0 - similarity)
    }

    /// Best-first search of one layer, returning up to `num_closest` slots
    /// sorted nearest first.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[usize],
        num_closest: usize,
        layer: usize,
    ) -> Vec<usize> {
        let num_closest = num_closest.max(1);
        let mut visited: HashSet<usize> = HashSet::with_capacity(num_closest * 4);
        let mut candidates: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

        for &slot in entry_points {
            if !visited.insert(slot) {
                continue;
            }
            if let Some(distance) = self.distance(query, slot) {
                let c = Candidate { distance, slot };
                candidates.push(Reverse(c));
                results.push(c);
                if results.len() > num_closest {
                    results.pop();
                }
            }
        }

        while let Some(Reverse(current)) = candidates.pop() {
            let worst = match results.peek() {
                Some(w) => w.distance,
                None => break,
            };
            if current.distance > worst {
                break;
            }

            let links = match self.node(current.slot).and_then(|n| n.links.get(layer)) {
                Some(links) => links,
                None => continue,
            };

            for &neighbor in links {
                if !visited.insert(neighbor) {
                    continue;
                }
                let Some(distance) = self.distance(query, neighbor) else {
                    continue;
                };
                let admit = results.len() < num_closest
                    || results.peek().map_or(true, |w| distance < w.distance);
                if admit {
                    let c = Candidate {
                        distance,
                        slot: neighbor,
                    };
                    candidates.push(Reverse(c));
                    results.push(c);
                    if results.len() > num_closest {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec().into_iter().map(|c| c.slot).collect()
    }

    /// Keep the `m` live candidates most similar to `base`
    fn select_neighbors(&self, base: &[f32], candidates: &[usize], m: usize) -> Vec<usize> {
        let mut scored: Vec<Candidate> = candidates
            .iter()
            .filter_map(|&slot| {
                self.distance(base, slot)
                    .map(|distance| Candidate { distance, slot })
            })
            .collect();
        scored.sort();
        scored.dedup_by_key(|c| c.slot);
        scored.truncate(m);
        scored.into_iter().map(|c| c.slot).collect()
    }

    fn insert(&mut self, id: Uuid, embedding: Vec<f32>) {
        let level = self.random_level();
        let node = Node {
            id,
            embedding,
            links: vec![Vec::new(); level + 1],
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.slots.insert(id, slot);

        let (entry, top) = match (self.entry_point, self.top_layer()) {
            (Some(entry), Some(top)) => (entry, top),
            _ => {
                self.entry_point = Some(slot);
                return;
            }
        };

        let query = match self.node(slot) {
            Some(node) => node.embedding.clone(),
            None => return,
        };

        let mut nearest = vec![entry];
        for layer in (level + 1..=top).rev() {
            nearest = self.search_layer(&query, &nearest, 1, layer);
        }

        for layer in (0..=level.min(top)).rev() {
            let candidates =
                self.search_layer(&query, &nearest, self.params.ef_construction, layer);
            let cap = self.layer_cap(layer);
            let neighbors = self.select_neighbors(&query, &candidates, cap);

            if let Some(node) = self.nodes[slot].as_mut() {
                node.links[layer] = neighbors.clone();
            }

            for &neighbor in &neighbors {
                self.link(neighbor, slot, layer, cap);
            }

            if !candidates.is_empty() {
                nearest = candidates;
            }
        }

        if level > top {
            self.entry_point = Some(slot);
        }
    }

    /// Add `target` to `from`'s links on `layer`, pruning to `cap`
    fn link(&mut self, from: usize, target: usize, layer: usize, cap: usize) {
        let Some(node) = self.nodes.get_mut(from).and_then(Option::as_mut) else {
            return;
        };
        let Some(links) = node.links.get_mut(layer) else {
            return;
        };
        links.push(target);
        if links.len() <= cap {
            return;
        }

        let current = links.clone();
        let base = node.embedding.clone();
        let pruned = self.select_neighbors(&base, &current, cap);
        if let Some(links) = self.nodes[from].as_mut().and_then(|n| n.links.get_mut(layer)) {
            *links = pruned;
        }
    }

    fn reset_graph(&mut self) {
        self.nodes.clear();
        self.slots.clear();
        self.free.clear();
        self.entry_point = None;
    }
}

impl VectorIndex for HnswIndex {
    fn index_type(&self) -> IndexType {
        IndexType::Hnsw
    }

    fn build(&mut self, chunks: &[Chunk]) -> Result<(), IndexError> {
        let dimension = self.dimension.plan_build(chunks)?;
        let started = std::time::Instant::now();

        self.reset_graph();
        self.dimension.set(dimension);
        for chunk in chunks.iter().filter(|c| c.has_embedding()) {
            if let Some(&old) = self.slots.get(&chunk.id) {
                self.unlink(old);
            }
            self.insert(chunk.id, chunk.embedding.clone());
        }

        tracing::debug!(
            "HNSW index built with {} nodes in {:?} (top layer {:?})",
            self.slots.len(),
            started.elapsed(),
            self.top_layer()
        );
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let (Some(entry), Some(top)) = (self.entry_point, self.top_layer()) else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimension.get() {
            check_dimension(expected, query)?;
        }

        let mut nearest = vec![entry];
        for layer in (1..=top).rev() {
            nearest = self.search_layer(query, &nearest, 1, layer);
        }
        let candidates = self.search_layer(query, &nearest, self.params.ef_search.max(k), 0);

        let mut hits = Vec::with_capacity(candidates.len());
        for slot in candidates {
            if let Some(node) = self.node(slot) {
                hits.push((node.id, cosine_similarity(query, &node.embedding)?));
            }
        }
        Ok(rank(hits, k))
    }

    fn add(&mut self, chunk: &Chunk) -> Result<(), IndexError> {
        if !chunk.has_embedding() {
            return Ok(());
        }
        self.dimension.admit(&chunk.embedding)?;

        if let Some(&old) = self.slots.get(&chunk.id) {
            self.unlink(old);
        }
        self.insert(chunk.id, chunk.embedding.clone());
        Ok(())
    }

    fn remove(&mut self, chunk_id: Uuid) {
        if let Some(&slot) = self.slots.get(&chunk_id) {
            self.unlink(slot);
        }
    }

    fn size(&self) -> usize {
        self.slots.len()
    }

    fn clear(&mut self) {
        self.reset_graph();
        self.dimension.reset();
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension.get()
    }
}

impl HnswIndex {
    /// Vacate `slot`, strip it from every link list and free it for reuse.
    ///
    /// Links are not symmetric after pruning, so the whole graph is scanned
    /// rather than only the removed node's own neighbors.
    fn unlink(&mut self, slot: usize) {
        let Some(node) = self.nodes.get_mut(slot).and_then(Option::take) else {
            return;
        };
        self.slots.remove(&node.id);

        for other in self.nodes.iter_mut().flatten() {
            for list in other.links.iter_mut() {
                list.retain(|&s| s != slot);
            }
        }
        self.free.push(slot);

        if self.entry_point == Some(slot) {
            // Highest remaining node keeps the descent covering every layer.
            self.entry_point = self
                .nodes
                .iter()
                .enumerate()
                .filter_map(|(s, n)| n.as_ref().map(|n| (s, n.level())))
                .max_by_key(|&(s, level)| (level, Reverse(s)))
                .map(|(s, _)| s);
        }
    }
}
