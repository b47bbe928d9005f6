//! Per-library index cache
//!
//! The map itself sits behind one lock and each cached index behind its own,
//! so searches on different libraries never contend and concurrent searches
//! on one library share a read guard.

use crate::concurrency::RwLock;
use crate::error::{ChunkdexError, Result};
use crate::index::{create_index, IndexOptions, VectorIndex};
use crate::models::{Chunk, Library};
use crate::repository::ChunkSource;
use ahash::{HashMap, HashMapExt};
use std::sync::Arc;
use uuid::Uuid;

/// Cached index handle; take `read()` to search, `write()` to mutate
pub type SharedIndex = Arc<RwLock<Box<dyn VectorIndex>>>;

pub struct IndexCache {
    options: IndexOptions,
    max_reported_invalid_ids: usize,
    indexes: RwLock<HashMap<Uuid, SharedIndex>>,
}

impl IndexCache {
    pub fn new(options: IndexOptions, max_reported_invalid_ids: usize) -> Self {
        Self {
            options,
            max_reported_invalid_ids,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn get(&self, library_id: Uuid) -> Option<SharedIndex> {
        self.indexes.read().get(&library_id).cloned()
    }

    /// Return the cached index for `library`, building it on a miss.
    ///
    /// The build runs without holding the map guard. If another thread
    /// cached an index meanwhile, theirs wins and ours is dropped.
    pub fn get_or_build(&self, library: &Library, source: &dyn ChunkSource) -> Result<SharedIndex> {
        if let Some(index) = self.get(library.id) {
            return Ok(index);
        }

        let built = self.build(library, source)?;
        let mut indexes = self.indexes.write();
        let entry = indexes.entry(library.id).or_insert(built);
        Ok(Arc::clone(entry))
    }

    /// Build a fresh index for `library` without caching it
    pub fn build(&self, library: &Library, source: &dyn ChunkSource) -> Result<SharedIndex> {
        let chunks: Vec<Chunk> = library
            .document_ids
            .iter()
            .flat_map(|doc| source.chunks_for_document(*doc))
            .collect();
        self.validate(library.id, &chunks)?;

        let mut index = create_index(library.index_type, &self.options);
        index.build(&chunks)?;
        tracing::info!(
            "Built {} index for library {} ({} chunks)",
            library.index_type,
            library.id,
            index.size()
        );
        Ok(Arc::new(RwLock::new(index)))
    }

    fn validate(&self, library_id: Uuid, chunks: &[Chunk]) -> Result<()> {
        let missing: Vec<Uuid> = chunks
            .iter()
            .filter(|c| !c.has_embedding())
            .map(|c| c.id)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        tracing::warn!(
            "Library {} has {} chunks without embeddings",
            library_id,
            missing.len()
        );
        Err(ChunkdexError::Validation {
            message: format!(
                "Cannot build index: {} chunks missing embeddings",
                missing.len()
            ),
            chunk_ids: missing
                .into_iter()
                .take(self.max_reported_invalid_ids)
                .collect(),
        })
    }

    /// Cache `index` for `library_id`, replacing any index already there
    pub fn replace(&self, library_id: Uuid, index: SharedIndex) {
        if self.indexes.write().insert(library_id, index).is_some() {
            tracing::debug!("Replaced cached index for library {}", library_id);
        }
    }

    /// Add `chunk` to the cached index in place under its write guard.
    ///
    /// Returns `false` when nothing is cached for the library; the chunk
    /// is picked up by the next build instead.
    pub fn add_chunk(&self, library_id: Uuid, chunk: &Chunk) -> Result<bool> {
        let Some(index) = self.get(library_id) else {
            return Ok(false);
        };
        index.write().add(chunk)?;
        Ok(true)
    }

    /// Remove `chunk_id` from the cached index; `false` when nothing is cached
    pub fn remove_chunk(&self, library_id: Uuid, chunk_id: Uuid) -> bool {
        let Some(index) = self.get(library_id) else {
            return false;
        };
        index.write().remove(chunk_id);
        true
    }

    /// Drop the cached index; returns whether one was cached
    pub fn invalidate(&self, library_id: Uuid) -> bool {
        let removed = self.indexes.write().remove(&library_id).is_some();
        if removed {
            tracing::debug!("Invalidated index for library {}", library_id);
        }
        removed
    }

    pub fn clear_all(&self) {
        self.indexes.write().clear();
    }

    pub fn len(&self) -> usize {
        self.indexes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, IndexType};
    use crate::repository::Store;

    fn library_with(store: &Store, embeddings: Vec<Vec<f32>>, index_type: IndexType) -> Library {
        let lib = store.create_library(Library::new("lib", index_type));
        let doc = store
            .add_document(lib.id, Document::new(lib.id, "doc"))
            .unwrap();
        for (i, emb) in embeddings.into_iter().enumerate() {
            store
                .add_chunk(doc.id, Chunk::new(doc.id, format!("chunk {i}"), emb))
                .unwrap();
        }
        store.library(lib.id).unwrap()
    }

    #[test]
    fn test_get_or_build_caches() {
        let store = Store::new();
        let lib = library_with(&store, vec![vec![1.0, 0.0], vec![0.0, 1.0]], IndexType::BruteForce);
        let cache = IndexCache::new(IndexOptions::default(), 10);

        let first = cache.get_or_build(&lib, &store).unwrap();
        assert_eq!(first.read().size(), 2);
        let second = cache.get_or_build(&lib, &store).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate(lib.id));
        assert!(!cache.invalidate(lib.id));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_embeddings_reported() {
        let store = Store::new();
        let embeddings = std::iter::repeat_with(Vec::new).take(15).collect();
        let lib = library_with(&store, embeddings, IndexType::Hnsw);
        let cache = IndexCache::new(IndexOptions::default(), 10);

        match cache.get_or_build(&lib, &store) {
            Err(ChunkdexError::Validation { message, chunk_ids }) => {
                assert!(message.contains("15 chunks missing embeddings"));
                assert_eq!(chunk_ids.len(), 10);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("build should fail"),
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_empty_library_builds_empty_index() {
        let store = Store::new();
        let lib = store.create_library(Library::new("empty", IndexType::Lsh));
        let cache = IndexCache::new(IndexOptions::default(), 10);

        let index = cache.get_or_build(&lib, &store).unwrap();
        assert!(index.read().is_empty());
        assert!(index.read().search(&[1.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_clear_all() {
        let store = Store::new();
        let cache = IndexCache::new(IndexOptions::default(), 10);
        for _ in 0..3 {
            let lib = library_with(&store, vec![vec![1.0, 2.0]], IndexType::BruteForce);
            cache.get_or_build(&lib, &store).unwrap();
        }
        assert_eq!(cache.len(), 3);
        cache.clear_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_replace_overwrites_cached_index() {
        let store = Store::new();
        let lib = library_with(&store, vec![vec![1.0, 0.0]], IndexType::BruteForce);
        let cache = IndexCache::new(IndexOptions::default(), 10);

        let stale = cache.get_or_build(&lib, &store).unwrap();
        let doc = lib.document_ids[0];
        store
            .add_chunk(doc, Chunk::new(doc, "late", vec![0.0, 1.0]))
            .unwrap();
        let lib = store.library(lib.id).unwrap();

        let fresh = cache.build(&lib, &store).unwrap();
        cache.replace(lib.id, Arc::clone(&fresh));
        let cached = cache.get(lib.id).unwrap();
        assert!(Arc::ptr_eq(&cached, &fresh));
        assert!(!Arc::ptr_eq(&cached, &stale));
        assert_eq!(cached.read().size(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_add_and_remove_chunk_in_place() {
        let store = Store::new();
        let lib = library_with(&store, vec![vec![1.0, 0.0], vec![0.0, 1.0]], IndexType::Hnsw);
        let cache = IndexCache::new(IndexOptions::default(), 10);

        let extra = Chunk::new(lib.document_ids[0], "extra", vec![0.6, 0.8]);
        assert!(!cache.add_chunk(lib.id, &extra).unwrap());
        assert!(!cache.remove_chunk(lib.id, extra.id));

        let index = cache.get_or_build(&lib, &store).unwrap();
        assert!(cache.add_chunk(lib.id, &extra).unwrap());
        assert_eq!(index.read().size(), 3);
        assert_eq!(index.read().search(&[0.6, 0.8], 1).unwrap()[0].0, extra.id);

        let wrong = Chunk::new(lib.document_ids[0], "wrong", vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            cache.add_chunk(lib.id, &wrong),
            Err(ChunkdexError::Index(_))
        ));

        assert!(cache.remove_chunk(lib.id, extra.id));
        assert_eq!(index.read().size(), 2);
        assert_eq!(index.state(), crate::concurrency::LockState::default());
    }
}
