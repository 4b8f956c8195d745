//! Storage seam between the memory client and a concrete vector database.

use async_trait::async_trait;

use robobrain_core::error::UpstreamError;
use robobrain_core::types::{MemoryQuery, MemoryRecord, ScoredMemory};

/// A vector database holding memory records.
///
/// Implementations score by inner product over unit vectors, so scores are
/// cosine similarities and results come back ordered by descending score.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Short name used in logs ("milvus", "in_memory").
    fn name(&self) -> &'static str;

    /// Store a record under its embedding.
    async fn insert(&self, embedding: Vec<f32>, record: &MemoryRecord) -> Result<(), UpstreamError>;

    /// Return up to `query.top_k` records nearest to `embedding` that pass the
    /// query's metadata filters.
    async fn search(
        &self,
        embedding: &[f32],
        query: &MemoryQuery,
    ) -> Result<Vec<ScoredMemory>, UpstreamError>;
}
