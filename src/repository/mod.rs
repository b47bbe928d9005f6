//! In-memory repositories for libraries, documents and chunks
//!
//! Each repository guards its own map. `Store` composes the three and keeps
//! the parent id lists (`Library::document_ids`, `Document::chunk_ids`) in
//! step with the child maps. No operation holds two repository guards at
//! once.
//!
//! Adds create the child before linking it into the parent and roll the
//! child back if the parent vanished in between. Deletes remove the parent
//! before sweeping its children. Together these leave no orphan behind when
//! an add races a cascading delete.

mod memory;

pub use memory::InMemoryRepository;

use crate::error::{ChunkdexError, Result};
use crate::models::{Chunk, Document, Library};
use uuid::Uuid;

pub type LibraryRepository = InMemoryRepository<Library>;
pub type DocumentRepository = InMemoryRepository<Document>;
pub type ChunkRepository = InMemoryRepository<Chunk>;

/// Where index builds fetch chunks from
pub trait ChunkSource: Send + Sync {
    fn chunks_for_document(&self, document_id: Uuid) -> Vec<Chunk>;
}

impl ChunkSource for ChunkRepository {
    fn chunks_for_document(&self, document_id: Uuid) -> Vec<Chunk> {
        self.list_by_document(document_id)
    }
}

#[derive(Default)]
pub struct Store {
    pub libraries: LibraryRepository,
    pub documents: DocumentRepository,
    pub chunks: ChunkRepository,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_library(&self, library: Library) -> Library {
        tracing::debug!("Creating library {} ({})", library.name, library.id);
        self.libraries.create(library)
    }

    pub fn library(&self, library_id: Uuid) -> Result<Library> {
        self.libraries
            .get(library_id)
            .ok_or(ChunkdexError::LibraryNotFound(library_id))
    }

    pub fn document(&self, document_id: Uuid) -> Result<Document> {
        self.documents
            .get(document_id)
            .ok_or(ChunkdexError::DocumentNotFound(document_id))
    }

    pub fn chunk(&self, chunk_id: Uuid) -> Result<Chunk> {
        self.chunks
            .get(chunk_id)
            .ok_or(ChunkdexError::ChunkNotFound(chunk_id))
    }

    /// Attach `document` to a library
    pub fn add_document(&self, library_id: Uuid, mut document: Document) -> Result<Document> {
        if !self.libraries.exists(library_id) {
            return Err(ChunkdexError::LibraryNotFound(library_id));
        }
        document.library_id = library_id;
        let document = self.documents.create(document);

        let id = document.id;
        let linked = self.libraries.update(library_id, |lib| {
            if !lib.document_ids.contains(&id) {
                lib.document_ids.push(id);
            }
        });
        if linked.is_none() {
            self.documents.delete(id);
            return Err(ChunkdexError::LibraryNotFound(library_id));
        }
        Ok(document)
    }

    /// Attach `chunk` to a document
    pub fn add_chunk(&self, document_id: Uuid, mut chunk: Chunk) -> Result<Chunk> {
        if !self.documents.exists(document_id) {
            return Err(ChunkdexError::DocumentNotFound(document_id));
        }
        chunk.document_id = document_id;
        let chunk = self.chunks.create(chunk);

        let id = chunk.id;
        let linked = self.documents.update(document_id, |doc| {
            if !doc.chunk_ids.contains(&id) {
                doc.chunk_ids.push(id);
            }
        });
        if linked.is_none() {
            self.chunks.delete(id);
            return Err(ChunkdexError::DocumentNotFound(document_id));
        }
        Ok(chunk)
    }

    pub fn delete_chunk(&self, chunk_id: Uuid) -> Result<()> {
        let chunk = self.chunk(chunk_id)?;
        self.chunks.delete(chunk_id);
        self.documents
            .update(chunk.document_id, |doc| doc.chunk_ids.retain(|c| *c != chunk_id));
        Ok(())
    }

    /// Delete a document and every chunk it owns
    pub fn delete_document(&self, document_id: Uuid) -> Result<()> {
        let document = self.document(document_id)?;
        if !self.documents.delete(document_id) {
            return Err(ChunkdexError::DocumentNotFound(document_id));
        }
        for chunk in self.chunks.list_by_document(document_id) {
            self.chunks.delete(chunk.id);
        }
        self.libraries.update(document.library_id, |lib| {
            lib.document_ids.retain(|d| *d != document_id)
        });
        tracing::debug!("Deleted document {} with its chunks", document_id);
        Ok(())
    }

    /// Delete a library, its documents and their chunks
    pub fn delete_library(&self, library_id: Uuid) -> Result<()> {
        if !self.libraries.delete(library_id) {
            return Err(ChunkdexError::LibraryNotFound(library_id));
        }
        for document in self.documents.list_by_library(library_id) {
            match self.delete_document(document.id) {
                Ok(()) | Err(ChunkdexError::DocumentNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn mark_indexed(&self, library_id: Uuid, indexed: bool) -> Result<Library> {
        self.libraries
            .update(library_id, |lib| lib.is_indexed = indexed)
            .ok_or(ChunkdexError::LibraryNotFound(library_id))
    }

    /// Every chunk of every document in the library, in document order
    pub fn library_chunks(&self, library_id: Uuid) -> Result<Vec<Chunk>> {
        let library = self.library(library_id)?;
        Ok(library
            .document_ids
            .iter()
            .flat_map(|doc| self.chunks.chunks_for_document(*doc))
            .collect())
    }
}

impl ChunkSource for Store {
    fn chunks_for_document(&self, document_id: Uuid) -> Vec<Chunk> {
        self.chunks.chunks_for_document(document_id)
    }
}
