//! Domain entities: libraries own documents, documents own chunks

use crate::index::IndexError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Free-form JSON metadata attached to entities
pub type Metadata = Map<String, Value>;

/// Nearest-neighbor algorithm backing a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    #[default]
    BruteForce,
    Hnsw,
    Lsh,
}

impl IndexType {
    pub const ALL: [IndexType; 3] = [IndexType::BruteForce, IndexType::Hnsw, IndexType::Lsh];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::BruteForce => "brute_force",
            IndexType::Hnsw => "hnsw",
            IndexType::Lsh => "lsh",
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brute_force" | "brute-force" | "bruteforce" => Ok(IndexType::BruteForce),
            "hnsw" => Ok(IndexType::Hnsw),
            "lsh" => Ok(IndexType::Lsh),
            other => Err(IndexError::UnknownIndexType(other.to_string())),
        }
    }
}

/// A unit of text plus its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default = "Uuid::nil")]
    pub document_id: Uuid,
    #[serde(default)]
    pub content: String,
    /// Empty when no embedding has been generated yet
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Chunk {
    pub fn new(document_id: Uuid, content: impl Into<String>, embedding: Vec<f32>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            document_id,
            content: content.into(),
            embedding,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bare chunk carrying only what an index looks at
    pub fn with_embedding(id: Uuid, embedding: Vec<f32>) -> Self {
        let mut chunk = Self::new(Uuid::nil(), String::new(), embedding);
        chunk.id = id;
        chunk
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub library_id: Uuid,
    #[serde(default)]
    pub chunk_ids: Vec<Uuid>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(library_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            library_id,
            chunk_ids: Vec::new(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A collection of documents searched through one index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub index_type: IndexType,
    #[serde(default)]
    pub document_ids: Vec<Uuid>,
    /// Set by `index_library`; searching an unindexed library fails
    #[serde(default)]
    pub is_indexed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Library {
    pub fn new(name: impl Into<String>, index_type: IndexType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            metadata: Metadata::new(),
            index_type,
            document_ids: Vec::new(),
            is_indexed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Entities the repositories can stamp on update
pub trait Entity: Clone {
    fn id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
    fn touch(&mut self);
}

impl Entity for Chunk {
    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Entity for Document {
    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Entity for Library {
    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
