use anyhow::{Context, Result};
use clap::Parser;
use ragquery::cache::EmbeddingCache;
use ragquery::chain::OpenAIChat;
use ragquery::db::Db;
use ragquery::embeddings::OpenAIEmbedder;
use ragquery::prompts::PromptTemplates;
use ragquery::retrieval::SqliteRetriever;
use ragquery::{AppState, Config, HttpServer};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "ragquery", version, about = "HTTP query dispatcher over a RAG pipeline")]
struct Args {
    /// Path to config.toml (falls back to RAGQUERY_CONFIG, then ./config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(long)]
    port: Option<u16>,

    /// Enable debug mode (verbose logging)
    #[arg(long)]
    debug: bool,
}

fn api_key(env_var: &str) -> Result<String> {
    std::env::var(env_var).with_context(|| {
        format!(
            "Environment variable {} not set. Set it in your .env file or as an environment variable.",
            env_var
        )
    })
}

/// Build the retriever and chain once; handlers only ever read them
async fn build_state(config: &Config) -> Result<AppState> {
    let cache = if config.retriever.cache_capacity > 0 {
        Some(Arc::new(EmbeddingCache::new(config.retriever.cache_capacity)))
    } else {
        None
    };
    let embedder = OpenAIEmbedder::new(
        api_key(&config.retriever.api_key_env)?,
        config.retriever.embedding_model.clone(),
        config.retriever.embedding_base_url.clone(),
        cache,
    )?;

    let db = Db::new(&config.retriever.db_path);
    db.ensure_schema().await?;
    let documents = db.count_documents().await?;
    if documents == 0 {
        log::warn!(
            "Vector store {} has no documents; retrieval will return empty results",
            db.path().display()
        );
    } else {
        log::info!("Vector store {} holds {} documents", db.path().display(), documents);
    }
    let retriever = SqliteRetriever::new(db, Arc::new(embedder));

    let chain = OpenAIChat::new(api_key(&config.generation.api_key_env)?, &config.generation)?;
    let prompts = PromptTemplates::from_config(&config.prompts)?;
    log::info!("Generation model: {} (templates: {})", config.generation.model, prompts.names().join(", "));

    Ok(AppState::new(Arc::new(retriever), Arc::new(chain), prompts))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    config.apply_overrides(args.host, args.port, args.debug);

    // Log level depends on the merged debug flag
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.log_level()),
    )
    .init();

    match &config.source {
        Some(path) => log::info!("Configuration loaded from {}", path.display()),
        None => log::info!("No config file found, using defaults"),
    }
    config.validate()?;

    log::info!("Starting RAGQuery v{}", env!("CARGO_PKG_VERSION"));

    let state = build_state(&config).await?;
    HttpServer::new(state, config.server.clone()).run().await?;

    Ok(())
}
