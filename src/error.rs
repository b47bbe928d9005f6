use crate::index::IndexError;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for chunkdex
#[derive(Error, Debug)]
pub enum ChunkdexError {
    /// Index level failures (dimension mismatch, unknown index type)
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Upstream data failed validation, nothing was built
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        /// Sample of offending chunk ids
        chunk_ids: Vec<Uuid>,
    },

    /// Library has not been indexed yet
    #[error("Index for library {library_id} has not been built. Call index_library() first.")]
    NotBuilt { library_id: Uuid },

    #[error("Library with ID {0} not found")]
    LibraryNotFound(Uuid),

    #[error("Document with ID {0} not found")]
    DocumentNotFound(Uuid),

    #[error("Chunk with ID {0} not found")]
    ChunkNotFound(Uuid),

    /// Requested result count outside the accepted range
    #[error("k must be between 1 and {max}, got {k}")]
    InvalidSearchK { k: usize, max: usize },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChunkdexError {
    /// True for any "no such entity" failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ChunkdexError::LibraryNotFound(_)
                | ChunkdexError::DocumentNotFound(_)
                | ChunkdexError::ChunkNotFound(_)
        )
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for chunkdex operations
pub type Result<T> = std::result::Result<T, ChunkdexError>;
