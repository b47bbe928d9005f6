use super::cache::{IndexCache, SharedIndex};
use crate::error::{ChunkdexError, Result};
use crate::index::IndexOptions;
use crate::models::{Chunk, Library, Metadata};
use crate::repository::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_K: usize = 10;
pub const DEFAULT_MAX_K: usize = 100;
pub const DEFAULT_MAX_REPORTED_INVALID_IDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_embedding: Vec<f32>,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Exact-match metadata constraints; every key must be present and equal
    #[serde(default)]
    pub filters: Metadata,
}

fn default_k() -> usize {
    DEFAULT_K
}

impl SearchRequest {
    pub fn new(query_embedding: Vec<f32>, k: usize) -> Self {
        Self {
            query_embedding,
            k,
            filters: Metadata::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub score: f32,
    pub metadata: Metadata,
}

impl SearchResult {
    fn from_chunk(chunk: Chunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            content: chunk.content,
            score,
            metadata: chunk.metadata,
        }
    }
}

/// Library-scoped similarity search over the store.
///
/// Indexes are built lazily and cached. Chunk mutations do not invalidate
/// the cache; call `invalidate` or `index_library` after changing a library.
pub struct SearchService {
    store: Arc<Store>,
    cache: IndexCache,
    max_k: usize,
}

impl SearchService {
    pub fn new(store: Arc<Store>, options: IndexOptions) -> Self {
        Self::with_limits(store, options, DEFAULT_MAX_K, DEFAULT_MAX_REPORTED_INVALID_IDS)
    }

    pub fn with_limits(
        store: Arc<Store>,
        options: IndexOptions,
        max_k: usize,
        max_reported_invalid_ids: usize,
    ) -> Self {
        Self {
            store,
            cache: IndexCache::new(options, max_reported_invalid_ids),
            max_k,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    pub fn max_k(&self) -> usize {
        self.max_k
    }

    /// Rebuild the library's index from current chunks and mark it indexed.
    ///
    /// The fresh index replaces whatever is cached, even one that a
    /// concurrent search cached while this build was running.
    pub fn index_library(&self, library_id: Uuid) -> Result<Library> {
        let library = self.store.library(library_id)?;
        let index = self.cache.build(&library, self.store.as_ref())?;
        self.cache.replace(library_id, index);
        self.store.mark_indexed(library_id, true)
    }

    /// Store `chunk` under `document_id` and add it to the cached index.
    ///
    /// A chunk the cached index rejects is removed from the store again.
    pub fn add_chunk(&self, document_id: Uuid, chunk: Chunk) -> Result<Chunk> {
        let document = self.store.document(document_id)?;
        let chunk = self.store.add_chunk(document_id, chunk)?;
        if let Err(e) = self.cache.add_chunk(document.library_id, &chunk) {
            self.store.delete_chunk(chunk.id)?;
            return Err(e);
        }
        Ok(chunk)
    }

    /// Delete a chunk from the store and from the cached index
    pub fn delete_chunk(&self, chunk_id: Uuid) -> Result<()> {
        let chunk = self.store.chunk(chunk_id)?;
        let document = self.store.document(chunk.document_id)?;
        self.store.delete_chunk(chunk_id)?;
        self.cache.remove_chunk(document.library_id, chunk_id);
        Ok(())
    }

    pub fn invalidate(&self, library_id: Uuid) -> bool {
        self.cache.invalidate(library_id)
    }

    pub fn search(&self, library_id: Uuid, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        if request.k == 0 || request.k > self.max_k {
            return Err(ChunkdexError::InvalidSearchK {
                k: request.k,
                max: self.max_k,
            });
        }
        let library = self.store.library(library_id)?;
        if !library.is_indexed {
            return Err(ChunkdexError::NotBuilt { library_id });
        }
        if request.query_embedding.is_empty() {
            return Err(ChunkdexError::InvalidQuery(
                "query_embedding must not be empty".to_string(),
            ));
        }

        let index = self.index_for(&library)?;
        let search_k = if request.filters.is_empty() {
            request.k
        } else {
            (request.k * 2).min(self.max_k)
        };
        let hits = index.read().search(&request.query_embedding, search_k)?;
        tracing::debug!(
            "Library {} search returned {} candidates for k={}",
            library_id,
            hits.len(),
            request.k
        );

        let mut results = Vec::with_capacity(request.k);
        for (chunk_id, score) in hits {
            let Some(chunk) = self.store.chunks.get(chunk_id) else {
                continue;
            };
            if !matches_filters(&chunk.metadata, &request.filters) {
                continue;
            }
            results.push(SearchResult::from_chunk(chunk, score));
            if results.len() >= request.k {
                break;
            }
        }
        Ok(results)
    }

    fn index_for(&self, library: &Library) -> Result<SharedIndex> {
        self.cache.get_or_build(library, self.store.as_ref())
    }
}

fn matches_filters(metadata: &Metadata, filters: &Metadata) -> bool {
    filters
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, IndexType};
    use serde_json::json;

    fn service_with_scenario() -> (SearchService, Uuid, Vec<Chunk>) {
        let store = Arc::new(Store::new());
        let lib = store.create_library(Library::new("lib", IndexType::BruteForce));
        let doc = store
            .add_document(lib.id, Document::new(lib.id, "doc"))
            .unwrap();

        let specs = [
            (vec![1.0, 0.0, 0.0, 0.0], "a"),
            (vec![0.0, 1.0, 0.0, 0.0], "b"),
            (vec![0.9, 0.1, 0.0, 0.0], "a"),
        ];
        let chunks = specs
            .into_iter()
            .map(|(emb, tag)| {
                let mut meta = Metadata::new();
                meta.insert("tag".to_string(), json!(tag));
                store
                    .add_chunk(doc.id, Chunk::new(doc.id, "text", emb).with_metadata(meta))
                    .unwrap()
            })
            .collect();

        (SearchService::new(store, IndexOptions::default()), lib.id, chunks)
    }

    #[test]
    fn test_search_requires_index() {
        let (service, lib, _) = service_with_scenario();
        let request = SearchRequest::new(vec![1.0, 0.0, 0.0, 0.0], 2);

        assert!(matches!(
            service.search(lib, &request),
            Err(ChunkdexError::NotBuilt { library_id }) if library_id == lib
        ));

        service.index_library(lib).unwrap();
        let results = service.search(lib, &request).unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_request_validation_order() {
        let (service, lib, _) = service_with_scenario();

        let bad_k = SearchRequest::new(Vec::new(), 0);
        assert!(matches!(
            service.search(Uuid::new_v4(), &bad_k),
            Err(ChunkdexError::InvalidSearchK { k: 0, max: 100 })
        ));

        let missing = SearchRequest::new(Vec::new(), 5);
        assert!(matches!(
            service.search(Uuid::new_v4(), &missing),
            Err(ChunkdexError::LibraryNotFound(_))
        ));

        service.index_library(lib).unwrap();
        assert!(matches!(
            service.search(lib, &missing),
            Err(ChunkdexError::InvalidQuery(_))
        ));

        let too_many = SearchRequest::new(vec![1.0, 0.0, 0.0, 0.0], 101);
        assert!(matches!(
            service.search(lib, &too_many),
            Err(ChunkdexError::InvalidSearchK { k: 101, .. })
        ));
    }

    #[test]
    fn test_metadata_filters() {
        let (service, lib, chunks) = service_with_scenario();
        service.index_library(lib).unwrap();

        let request = SearchRequest::new(vec![0.0, 1.0, 0.0, 0.0], 2).with_filter("tag", json!("a"));
        let results = service.search(lib, &request).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.metadata["tag"] == json!("a")));
        assert!(results.iter().all(|r| r.chunk_id != chunks[1].id));

        let none = SearchRequest::new(vec![1.0, 0.0, 0.0, 0.0], 3).with_filter("tag", json!("z"));
        assert!(service.search(lib, &none).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_surfaces() {
        let (service, lib, _) = service_with_scenario();
        service.index_library(lib).unwrap();
        let err = service
            .search(lib, &SearchRequest::new(vec![1.0, 0.0], 1))
            .unwrap_err();
        assert!(matches!(err, ChunkdexError::Index(_)));
    }

    #[test]
    fn test_stale_until_invalidated() {
        let (service, lib, _) = service_with_scenario();
        service.index_library(lib).unwrap();

        let doc = service.store().library(lib).unwrap().document_ids[0];
        let added = service
            .store()
            .add_chunk(doc, Chunk::new(doc, "new", vec![0.0, 0.0, 1.0, 0.0]))
            .unwrap();
        let query = SearchRequest::new(vec![0.0, 0.0, 1.0, 0.0], 1);

        let stale = service.search(lib, &query).unwrap();
        assert_ne!(stale[0].chunk_id, added.id);

        assert!(service.invalidate(lib));
        let fresh = service.search(lib, &query).unwrap();
        assert_eq!(fresh[0].chunk_id, added.id);
    }

    #[test]
    fn test_index_library_replaces_cached_index() {
        let (service, lib, _) = service_with_scenario();
        let library = service.store().library(lib).unwrap();
        let early = service
            .cache()
            .build(&library, service.store().as_ref())
            .unwrap();
        service.cache().replace(lib, Arc::clone(&early));

        let doc = library.document_ids[0];
        service
            .store()
            .add_chunk(doc, Chunk::new(doc, "late", vec![0.0, 0.0, 1.0, 0.0]))
            .unwrap();
        service.index_library(lib).unwrap();

        let cached = service.cache().get(lib).unwrap();
        assert!(!Arc::ptr_eq(&cached, &early));
        assert_eq!(cached.read().size(), 4);
        assert_eq!(early.read().size(), 3);
    }

    #[test]
    fn test_chunk_mutations_reach_cached_index() {
        let (service, lib, chunks) = service_with_scenario();
        service.index_library(lib).unwrap();
        let doc = chunks[0].document_id;
        let query = SearchRequest::new(vec![0.0, 0.0, 1.0, 0.0], 1);

        let added = service
            .add_chunk(doc, Chunk::new(doc, "new", vec![0.0, 0.0, 1.0, 0.0]))
            .unwrap();
        assert_eq!(service.search(lib, &query).unwrap()[0].chunk_id, added.id);

        service.delete_chunk(added.id).unwrap();
        assert!(service.store().chunk(added.id).is_err());
        let hits = service.search(lib, &query).unwrap();
        assert!(hits.iter().all(|r| r.chunk_id != added.id));

        let err = service
            .add_chunk(doc, Chunk::new(doc, "short", vec![1.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, ChunkdexError::Index(_)));
        assert_eq!(service.store().library_chunks(lib).unwrap().len(), 3);
    }
}
