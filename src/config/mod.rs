//! Configuration management for chunkdex
//!
//! TOML file with per-algorithm sections, named profiles layered on top, and
//! `CHUNKDEX_SECTION__KEY` environment overrides applied last.

use crate::error::{ChunkdexError, Result};
use crate::index::{HnswParams, IndexOptions, LshParams};
use crate::models::IndexType;
use crate::search::{DEFAULT_K, DEFAULT_MAX_K, DEFAULT_MAX_REPORTED_INVALID_IDS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

const ENV_PREFIX: &str = "CHUNKDEX_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub hnsw: HnswParams,
    #[serde(default)]
    pub lsh: LshParams,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Algorithm used when a library or command does not name one
    #[serde(default)]
    pub default_type: IndexType,
    /// Fixed embedding dimension; learned from data when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_k: usize,
    pub max_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: DEFAULT_K,
            max_k: DEFAULT_MAX_K,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Chunk ids listed in a failed-build error
    pub max_reported_invalid_ids: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_reported_invalid_ids: DEFAULT_MAX_REPORTED_INVALID_IDS,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_index_type: Option<IndexType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_search: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_tables: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ChunkdexError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ChunkdexError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ChunkdexError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ChunkdexError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| ChunkdexError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(index_type) = overrides.default_index_type {
            self.index.default_type = index_type;
        }
        if let Some(ef_search) = overrides.ef_search {
            self.hnsw.ef_search = ef_search;
        }
        if let Some(num_tables) = overrides.num_tables {
            self.lsh.num_tables = num_tables;
        }
        tracing::debug!("Applied config profile '{}'", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CHUNKDEX_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "INDEX__DEFAULT_TYPE" => {
                self.index.default_type = IndexType::from_str(value)?;
            }
            "INDEX__DIMENSION" => self.index.dimension = Some(parse_env(path, value)?),
            "HNSW__M" => self.hnsw.m = parse_env(path, value)?,
            "HNSW__EF_CONSTRUCTION" => self.hnsw.ef_construction = parse_env(path, value)?,
            "HNSW__EF_SEARCH" => self.hnsw.ef_search = parse_env(path, value)?,
            "HNSW__SEED" => self.hnsw.seed = Some(parse_env(path, value)?),
            "LSH__NUM_TABLES" => self.lsh.num_tables = parse_env(path, value)?,
            "LSH__NUM_HYPERPLANES" => self.lsh.num_hyperplanes = parse_env(path, value)?,
            "LSH__SEED" => self.lsh.seed = Some(parse_env(path, value)?),
            "SEARCH__DEFAULT_K" => self.search.default_k = parse_env(path, value)?,
            "SEARCH__MAX_K" => self.search.max_k = parse_env(path, value)?,
            "CACHE__MAX_REPORTED_INVALID_IDS" => {
                self.cache.max_reported_invalid_ids = parse_env(path, value)?
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Index construction options derived from this configuration
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            dimension: self.index.dimension,
            hnsw: self.hnsw.clone(),
            lsh: self.lsh.clone(),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ChunkdexError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("chunkdex").join("config.toml"))
    }
}

fn parse_env<T: FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ChunkdexError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}' as a number", value),
        })
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "fast".to_string(),
            ProfileOverrides {
                default_index_type: Some(IndexType::Lsh),
                ef_search: None,
                num_tables: Some(4),
            },
        );
        profiles.insert(
            "accurate".to_string(),
            ProfileOverrides {
                default_index_type: Some(IndexType::Hnsw),
                ef_search: Some(200),
                num_tables: None,
            },
        );

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            index: IndexConfig::default(),
            hnsw: HnswParams::default(),
            lsh: LshParams::default(),
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
            profiles,
        }
    }
}
