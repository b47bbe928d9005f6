//! Generic in-memory entity map guarded by the crate's writer-priority lock

use crate::concurrency::RwLock;
use crate::models::{Chunk, Document, Entity};
use ahash::{HashMap, HashMapExt};
use uuid::Uuid;

/// Thread-safe map of entities keyed by id.
///
/// Reads take the shared guard, mutations take the exclusive one. Values are
/// handed out as clones so no guard outlives a call.
pub struct InMemoryRepository<T: Entity> {
    items: RwLock<HashMap<Uuid, T>>,
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Insert `item`, replacing any entity with the same id
    pub fn create(&self, item: T) -> T {
        let mut items = self.items.write();
        items.insert(item.id(), item.clone());
        item
    }

    pub fn get(&self, id: Uuid) -> Option<T> {
        self.items.read().get(&id).cloned()
    }

    /// All entities, oldest first
    pub fn list(&self) -> Vec<T> {
        self.list_where(|_| true)
    }

    /// Entities matching `pred`, oldest first
    pub fn list_where(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let mut out: Vec<T> = self
            .items
            .read()
            .values()
            .filter(|item| pred(item))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        out
    }

    /// Apply `f` to the stored entity and stamp it.
    ///
    /// `f` runs under the write guard and must not call back into this
    /// repository.
    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut items = self.items.write();
        let item = items.get_mut(&id)?;
        f(item);
        item.touch();
        Some(item.clone())
    }

    /// Returns whether an entity was removed
    pub fn delete(&self, id: Uuid) -> bool {
        self.items.write().remove(&id).is_some()
    }

    pub fn exists(&self, id: Uuid) -> bool {
        self.items.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository<Document> {
    pub fn list_by_library(&self, library_id: Uuid) -> Vec<Document> {
        self.list_where(|d| d.library_id == library_id)
    }
}

impl InMemoryRepository<Chunk> {
    pub fn list_by_document(&self, document_id: Uuid) -> Vec<Chunk> {
        self.list_where(|c| c.document_id == document_id)
    }
}
