//! Embedding service trait and implementations.
//!
//! - `OllamaEmbedding` calls an Ollama-compatible `/api/embed` endpoint. This
//!   is the production backend.
//! - `MockEmbedding` provides deterministic hash-based vectors for tests and
//!   local development.
//!
//! Both return L2-normalised vectors so that inner-product search scores are
//! cosine similarities.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use robobrain_core::config::EmbeddingConfig;
use robobrain_core::error::{BrainError, UpstreamError, UpstreamService};

const SERVICE: UpstreamService = UpstreamService::Embedding;

/// Service for generating text embeddings.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, UpstreamError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// Every `EmbeddingService` implements this through the blanket impl below,
/// so `Arc<dyn DynEmbeddingService>` can be stored without generics.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, UpstreamError>> + Send + 'a>>;

    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, UpstreamError>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// OllamaEmbedding
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Embedding service backed by an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaEmbedding {
    base_url: String,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OllamaEmbedding {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, BrainError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrainError::Config(format!("embedding HTTP client: {}", e)))?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimension,
            client,
        })
    }
}

impl EmbeddingService for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::unavailable(
                SERVICE,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;

        let mut vector = parsed
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::invalid_response(SERVICE, "no embeddings returned"))?;

        if vector.len() != self.dimensions {
            return Err(UpstreamError::invalid_response(
                SERVICE,
                format!(
                    "expected {} dimensions, got {}",
                    self.dimensions,
                    vector.len()
                ),
            ));
        }

        l2_normalize(&mut vector);
        debug!(model = %self.model, dimensions = vector.len(), "Embedded text");
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding
// ---------------------------------------------------------------------------

/// Deterministic hash-based embedding.
///
/// Identical text always yields the identical unit vector, so an exact-text
/// search scores 1.0. Unrelated texts score near 0.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl MockEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result: Vec<f32> = (0..self.dimensions)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                i.hash(&mut hasher);
                let h = hasher.finish();
                (((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0) as f32
            })
            .collect();
        l2_normalize(&mut result);
        result
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        if text.is_empty() {
            return Err(UpstreamError::invalid_response(
                SERVICE,
                "cannot embed empty text",
            ));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            api_url: format!("{}/", server.uri()),
            dimension,
            timeout_secs: 1,
            ..EmbeddingConfig::default()
        }
    }

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn test_mock_embedding_dimension_and_norm() {
        let service = MockEmbedding::new(64);
        let v = service.embed("hello world").await.unwrap();
        assert_eq!(v.len(), 64);
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_mock_embedding_deterministic() {
        let service = MockEmbedding::new(32);
        let v1 = service.embed("same text").await.unwrap();
        let v2 = service.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
        let v3 = service.embed("other text").await.unwrap();
        assert_ne!(v1, v3);
    }

    #[tokio::test]
    async fn test_mock_embedding_rejects_empty_text() {
        let service = MockEmbedding::new(8);
        assert!(service.embed("").await.is_err());
    }

    #[tokio::test]
    async fn test_dyn_embedding_dispatch() {
        let service: Box<dyn DynEmbeddingService> = Box::new(MockEmbedding::new(16));
        assert_eq!(service.dimensions(), 16);
        assert_eq!(service.embed_boxed("x").await.unwrap().len(), 16);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0f32; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);

        let mut v = vec![3.0f32, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ollama_embedding_normalises_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({"model": "bge-m3", "input": "ห้องสมุด"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[3.0, 4.0]]})),
            )
            .mount(&server)
            .await;

        let service = OllamaEmbedding::new(&config_for(&server, 2)).unwrap();
        let v = service.embed("ห้องสมุด").await.unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ollama_embedding_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0, 0.0, 0.0]]})),
            )
            .mount(&server)
            .await;

        let service = OllamaEmbedding::new(&config_for(&server, 2)).unwrap();
        let err = service.embed("x").await.unwrap_err();
        assert_eq!(err.kind(), "invalid_response");
        assert_eq!(err.service(), UpstreamService::Embedding);
    }

    #[tokio::test]
    async fn test_ollama_embedding_empty_list_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": []})))
            .mount(&server)
            .await;

        let service = OllamaEmbedding::new(&config_for(&server, 2)).unwrap();
        assert_eq!(service.embed("x").await.unwrap_err().kind(), "invalid_response");
    }

    #[tokio::test]
    async fn test_ollama_embedding_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let service = OllamaEmbedding::new(&config_for(&server, 2)).unwrap();
        let err = service.embed("x").await.unwrap_err();
        assert_eq!(err.kind(), "unavailable");
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_ollama_embedding_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"embeddings": [[1.0, 0.0]]}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let service = OllamaEmbedding::new(&config_for(&server, 2)).unwrap();
        assert_eq!(service.embed("x").await.unwrap_err().kind(), "timeout");
    }
}
