use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{ChunkdexError, Result, ValidationError};

const MAX_HYPERPLANES: usize = 64;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_hnsw(config, &mut errors);
        Self::validate_lsh(config, &mut errors);
        Self::validate_search(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ChunkdexError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.index.dimension == Some(0) {
            errors.push(ValidationError::new(
                "index.dimension",
                "Dimension must be greater than 0 when set",
            ));
        }
    }

    fn validate_hnsw(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.hnsw.m == 0 {
            errors.push(ValidationError::new("hnsw.m", "M must be at least 1"));
        }
        if config.hnsw.ef_construction == 0 {
            errors.push(ValidationError::new(
                "hnsw.ef_construction",
                "ef_construction must be at least 1",
            ));
        }
        if config.hnsw.ef_search == 0 {
            errors.push(ValidationError::new(
                "hnsw.ef_search",
                "ef_search must be at least 1",
            ));
        }
    }

    fn validate_lsh(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.lsh.num_tables == 0 {
            errors.push(ValidationError::new(
                "lsh.num_tables",
                "num_tables must be at least 1",
            ));
        }

        let planes = config.lsh.num_hyperplanes;
        if !(1..=MAX_HYPERPLANES).contains(&planes) {
            errors.push(ValidationError::new(
                "lsh.num_hyperplanes",
                format!(
                    "num_hyperplanes must be between 1 and {}, got {}",
                    MAX_HYPERPLANES, planes
                ),
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        let search = &config.search;
        if search.max_k == 0 {
            errors.push(ValidationError::new(
                "search.max_k",
                "max_k must be at least 1",
            ));
        }
        if search.default_k == 0 || search.default_k > search.max_k {
            errors.push(ValidationError::new(
                "search.default_k",
                format!(
                    "default_k must be between 1 and max_k ({}), got {}",
                    search.max_k, search.default_k
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_for(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(ChunkdexError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(()) => Vec::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_schema_version() {
        let mut config = Config::default();
        config.meta.schema_version = "0.9".to_string();
        assert_eq!(errors_for(&config), vec!["_meta.schema_version"]);
    }

    #[test]
    fn test_zero_parameters() {
        let mut config = Config::default();
        config.hnsw.m = 0;
        config.hnsw.ef_search = 0;
        config.lsh.num_tables = 0;
        config.index.dimension = Some(0);
        let paths = errors_for(&config);
        assert_eq!(paths.len(), 4);
        assert!(paths.contains(&"hnsw.m".to_string()));
        assert!(paths.contains(&"index.dimension".to_string()));
    }

    #[test]
    fn test_hyperplane_bounds() {
        let mut config = Config::default();
        config.lsh.num_hyperplanes = 65;
        assert_eq!(errors_for(&config), vec!["lsh.num_hyperplanes"]);
        config.lsh.num_hyperplanes = 64;
        assert!(errors_for(&config).is_empty());
    }

    #[test]
    fn test_default_k_above_max() {
        let mut config = Config::default();
        config.search.default_k = 50;
        config.search.max_k = 20;
        assert_eq!(errors_for(&config), vec!["search.default_k"]);
    }
}
