//! Memory client: embeds text and delegates storage to a vector backend.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use robobrain_core::error::UpstreamError;
use robobrain_core::types::{MemoryQuery, MemoryRecord, ScoredMemory};

use crate::backend::VectorBackend;
use crate::embedding::DynEmbeddingService;

/// Errors from memory insert and search.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Invalid memory request: {0}")]
    Validation(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl MemoryError {
    /// Stable snake_case name of the failure kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryError::Validation(_) => "validation",
            MemoryError::Upstream(e) => e.kind(),
        }
    }
}

/// Long-term memory as seen by the intent router and the HTTP surface.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn insert(&self, record: MemoryRecord) -> Result<(), MemoryError>;

    async fn search(&self, query: &MemoryQuery) -> Result<Vec<ScoredMemory>, MemoryError>;
}

/// [`MemoryStore`] over an embedding service and a vector backend.
pub struct MemoryClient {
    embedder: Arc<dyn DynEmbeddingService>,
    backend: Arc<dyn VectorBackend>,
}

impl MemoryClient {
    pub fn new(embedder: Arc<dyn DynEmbeddingService>, backend: Arc<dyn VectorBackend>) -> Self {
        Self { embedder, backend }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.embedder.embed_boxed(text).await.map_err(|e| {
            warn!(error_kind = e.kind(), error = %e, "Embedding failed");
            MemoryError::from(e)
        })
    }
}

#[async_trait]
impl MemoryStore for MemoryClient {
    async fn insert(&self, record: MemoryRecord) -> Result<(), MemoryError> {
        record.validate().map_err(MemoryError::Validation)?;

        let embedding = self.embed(&record.text).await?;
        self.backend.insert(embedding, &record).await.map_err(|e| {
            warn!(
                backend = self.backend.name(),
                error_kind = e.kind(),
                error = %e,
                "Memory insert failed"
            );
            MemoryError::from(e)
        })?;

        debug!(
            memory_type = %record.memory_type,
            student_id = record.student_id.as_deref().unwrap_or(""),
            "Memory inserted"
        );
        Ok(())
    }

    async fn search(&self, query: &MemoryQuery) -> Result<Vec<ScoredMemory>, MemoryError> {
        if query.text.trim().is_empty() {
            return Err(MemoryError::Validation("'query' must not be empty".into()));
        }
        if query.top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embed(&query.text).await?;
        let hits = self.backend.search(&embedding, query).await.map_err(|e| {
            warn!(
                backend = self.backend.name(),
                error_kind = e.kind(),
                error = %e,
                "Memory search failed"
            );
            MemoryError::from(e)
        })?;

        debug!(count = hits.len(), top_k = query.top_k, "Memory search complete");
        Ok(hits)
    }
}
