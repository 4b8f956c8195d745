//! robobrain binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Build the embedding service and vector backend
//! 3. Probe the model server and vector database
//! 4. Start the axum REST API server

mod cli;

use std::sync::Arc;

use clap::Parser;

use robobrain_api::routes;
use robobrain_api::state::AppState;
use robobrain_core::config::{BrainConfig, EmbeddingBackend, VectorStoreBackend};
use robobrain_llm::{LanguageModel, OllamaClient};
use robobrain_memory::{
    DynEmbeddingService, MemoryClient, MemoryStore, MilvusBackend, MockEmbedding,
    OllamaEmbedding, VectorBackend, VectorIndex,
};

use cli::CliArgs;

type BoxError = Box<dyn std::error::Error>;

fn build_embedder(config: &BrainConfig) -> Result<Arc<dyn DynEmbeddingService>, BoxError> {
    let embedder: Arc<dyn DynEmbeddingService> = match config.embedding.backend {
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedding::new(&config.embedding)?),
        EmbeddingBackend::Mock => {
            tracing::warn!("Using mock embeddings; search results are not semantic");
            Arc::new(MockEmbedding::new(config.embedding.dimension))
        }
    };
    tracing::info!(
        backend = ?config.embedding.backend,
        model = %config.embedding.model,
        dimension = config.embedding.dimension,
        "Embedding service ready"
    );
    Ok(embedder)
}

/// Build the vector backend, creating the Milvus collection if it is missing.
/// An unreachable server only logs a warning.
async fn build_backend(config: &BrainConfig) -> Result<Arc<dyn VectorBackend>, BoxError> {
    match config.vector_store.backend {
        VectorStoreBackend::Milvus => {
            let milvus = MilvusBackend::new(&config.vector_store)?;
            match milvus.ensure_collection(config.embedding.dimension).await {
                Ok(true) => tracing::info!(
                    collection = %config.vector_store.collection,
                    "Created vector collection"
                ),
                Ok(false) => tracing::info!(
                    collection = %config.vector_store.collection,
                    "Vector collection present"
                ),
                Err(e) => tracing::warn!(
                    url = %config.vector_store.url,
                    error_kind = e.kind(),
                    error = %e,
                    "Vector database not reachable at startup"
                ),
            }
            Ok(Arc::new(milvus))
        }
        VectorStoreBackend::InMemory => {
            tracing::warn!("Using in-process vector index; memories are lost on restart");
            Ok(Arc::new(VectorIndex::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so the log level can come from it.
    let config_file = args.resolve_config_path();
    let loaded = if config_file.exists() {
        Some(BrainConfig::load(&config_file))
    } else {
        None
    };
    let mut config = match loaded {
        Some(Ok(ref c)) => c.clone(),
        _ => BrainConfig::default(),
    };
    config.general.host = args.resolve_host(&config.general.host);
    config.general.port = args.resolve_port(config.general.port);
    let log_level = args.resolve_log_level(&config.general.log_level);

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting robobrain v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Some(Ok(_)) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(Err(e)) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Invalid config file, using defaults"
        ),
        None => tracing::warn!(path = %config_file.display(), "Config file not found, using defaults"),
    }

    // Language model.
    let llm = OllamaClient::new(&config.llm)?;
    if let Err(e) = llm.check_model().await {
        tracing::warn!(
            url = %config.llm.api_url,
            error_kind = e.kind(),
            error = %e,
            "Model server not reachable at startup"
        );
    }
    let llm: Arc<dyn LanguageModel> = Arc::new(llm);

    // Memory.
    let embedder = build_embedder(&config)?;
    let backend = build_backend(&config).await?;
    let memory: Arc<dyn MemoryStore> = Arc::new(MemoryClient::new(embedder, backend));

    let state = AppState::new(config.clone(), memory, llm)?;
    routes::start_server(&config, state).await?;

    tracing::info!("robobrain stopped");
    Ok(())
}
