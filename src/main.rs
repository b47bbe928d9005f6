use chunkdex::bench::{self, BenchParams, BenchReport};
use chunkdex::cli::{parse_query_vector, Cli, Commands, ConfigAction};
use chunkdex::config::Config;
use chunkdex::error::{ChunkdexError, Result};
use chunkdex::models::{Chunk, Document, IndexType, Library};
use chunkdex::repository::Store;
use chunkdex::search::{SearchRequest, SearchResult, SearchService};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Search {
            chunks,
            query,
            index,
            k,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_search(&config, &chunks, &query, index, k, json)?;
        }
        Commands::Bench {
            count,
            dimension,
            queries,
            k,
            seed,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            let params = BenchParams {
                count,
                dimension,
                queries,
                k,
                seed,
            };
            cmd_bench(&config, &params, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "chunkdex=debug" } else { "chunkdex=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_search(
    config: &Config,
    chunks_path: &Path,
    query: &str,
    index_type: Option<IndexType>,
    k: Option<usize>,
    json: bool,
) -> Result<()> {
    let chunks = read_chunks(chunks_path)?;
    let query_embedding = parse_query_vector(query).map_err(ChunkdexError::InvalidQuery)?;
    let index_type = index_type.unwrap_or(config.index.default_type);

    let store = Arc::new(Store::new());
    let library = store.create_library(Library::new(
        chunks_path.display().to_string(),
        index_type,
    ));
    let document = store.add_document(library.id, Document::new(library.id, "input"))?;
    for chunk in chunks {
        store.add_chunk(document.id, chunk)?;
    }

    let service = SearchService::with_limits(
        Arc::clone(&store),
        config.index_options(),
        config.search.max_k,
        config.cache.max_reported_invalid_ids,
    );
    service.index_library(library.id)?;

    let request = SearchRequest::new(query_embedding, k.unwrap_or(config.search.default_k));
    let results = service.search(library.id, &request)?;

    if json {
        print_json(&results)?;
    } else {
        print_results(index_type, &results);
    }
    Ok(())
}

fn read_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let content = std::fs::read_to_string(path).map_err(|e| ChunkdexError::Io {
        source: e,
        context: format!("Failed to read chunk file: {:?}", path),
    })?;
    let chunks: Vec<Chunk> = serde_json::from_str(&content).map_err(|e| ChunkdexError::Json {
        source: e,
        context: format!("Failed to parse chunk file: {:?}", path),
    })?;
    tracing::info!("Loaded {} chunks from {}", chunks.len(), path.display());
    Ok(chunks)
}

fn print_results(index_type: IndexType, results: &[SearchResult]) {
    println!("{} results ({} index)", results.len(), index_type);
    println!("==========");
    for (rank, result) in results.iter().enumerate() {
        let preview: String = result.content.chars().take(60).collect();
        println!(
            "{:>3}. {:.4}  {}  {}",
            rank + 1,
            result.score,
            result.chunk_id,
            preview
        );
    }
}

fn cmd_bench(config: &Config, params: &BenchParams, json: bool) -> Result<()> {
    let reports = bench::run(params, &config.index_options())?;
    if json {
        return print_json(&reports);
    }

    println!(
        "{} vectors x {} dims, {} queries, k={}",
        params.count, params.dimension, params.queries, params.k
    );
    println!(
        "{:<12} {:>8} {:>12} {:>14} {:>10}",
        "index", "size", "build (ms)", "search (us)", "recall@k"
    );
    for BenchReport {
        index_type,
        size,
        build_ms,
        avg_search_us,
        recall_at_k,
    } in &reports
    {
        println!(
            "{:<12} {:>8} {:>12.2} {:>14.1} {:>10.3}",
            index_type.as_str(),
            size,
            build_ms,
            avg_search_us,
            recall_at_k
        );
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ChunkdexError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })?;
    println!("{}", json);
    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Default index: {}", config.index.default_type);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => expand_path(&path)?,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
        ConfigAction::Path => {
            let path = match config_path {
                Some(path) => expand_path(&path)?,
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => expand_path(&path)?,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::debug!(
            "Config file not found, using defaults. Run 'chunkdex config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        chunkdex::config::ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ChunkdexError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ChunkdexError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
