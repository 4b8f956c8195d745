//! In-memory vector index with brute-force cosine similarity search.
//!
//! Used when `vector_store.backend = "in_memory"` and in tests. Search is
//! O(n) over all entries, which is fine for a development data set.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use robobrain_core::error::{UpstreamError, UpstreamService};
use robobrain_core::types::{MemoryQuery, MemoryRecord, ScoredMemory};

use crate::backend::VectorBackend;

#[derive(Debug, Clone)]
struct VectorEntry {
    embedding: Vec<f32>,
    record: MemoryRecord,
}

/// Process-local vector index.
///
/// Thread-safe via an interior RwLock; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Arc<RwLock<HashMap<Uuid, VectorEntry>>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poison) => {
                warn!("Vector index lock poisoned while counting records");
                poison.into_inner().len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> UpstreamError {
        UpstreamError::unavailable(UpstreamService::VectorStore, "index lock poisoned")
    }
}

#[async_trait]
impl VectorBackend for VectorIndex {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    async fn insert(&self, embedding: Vec<f32>, record: &MemoryRecord) -> Result<(), UpstreamError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert(
            Uuid::new_v4(),
            VectorEntry {
                embedding,
                record: record.clone(),
            },
        );
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        query: &MemoryQuery,
    ) -> Result<Vec<ScoredMemory>, UpstreamError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;

        let mut scored: Vec<ScoredMemory> = entries
            .values()
            .filter(|entry| query.matches(&entry.record))
            .map(|entry| ScoredMemory {
                record: entry.record.clone(),
                score: cosine_similarity(embedding, &entry.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.top_k);
        Ok(scored)
    }
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when the lengths differ or either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
