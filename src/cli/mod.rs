//! CLI command definitions and parsing
use crate::models::IndexType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chunkdex",
    version,
    author = "neur0map",
    about = "Vector similarity search over embedded text chunks",
    long_about = "Chunkdex indexes embedded chunks with brute-force, HNSW or LSH indexes and \
                  answers k-nearest-neighbor queries by cosine similarity."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/chunkdex/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply (e.g., "fast", "accurate")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an index over a JSON chunk file and run one query
    Search {
        /// JSON array of chunks, each with at least an "embedding"
        #[arg(long, value_name = "FILE")]
        chunks: PathBuf,

        /// Comma-separated query vector (e.g., "0.1,0.2,0.3")
        #[arg(short, long)]
        query: String,

        /// Index algorithm (defaults to index.default_type)
        #[arg(short, long)]
        index: Option<IndexType>,

        /// Number of results (defaults to search.default_k)
        #[arg(short)]
        k: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Compare build time, search latency and recall of every index type
    Bench {
        /// Number of synthetic vectors
        #[arg(short = 'n', long, default_value = "1000")]
        count: usize,

        /// Vector dimension
        #[arg(short, long, default_value = "128")]
        dimension: usize,

        /// Number of random queries
        #[arg(long, default_value = "100")]
        queries: usize,

        /// Neighbors per query
        #[arg(short, default_value = "10")]
        k: usize,

        /// Seed for data and query generation
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Parse "0.1, 0.2,0.3" into a vector
pub fn parse_query_vector(raw: &str) -> Result<Vec<f32>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .map_err(|_| format!("'{}' is not a number", s))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_args() {
        let cli = Cli::try_parse_from([
            "chunkdex", "search", "--chunks", "c.json", "--query", "1,0", "--index", "lsh", "-k",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { index, k, json, .. } => {
                assert_eq!(index, Some(IndexType::Lsh));
                assert_eq!(k, Some(3));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_query_vector() {
        assert_eq!(parse_query_vector("0.5, -1,2").unwrap(), vec![0.5, -1.0, 2.0]);
        assert!(parse_query_vector("").unwrap().is_empty());
        assert!(parse_query_vector("1,x").is_err());
    }
}
