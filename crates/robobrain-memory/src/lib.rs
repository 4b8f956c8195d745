//! Long-term memory for the robot: text embeddings plus a vector database.
//!
//! Provides the `EmbeddingService` trait (Ollama and mock implementations),
//! the `VectorBackend` seam (Milvus REST and an in-process index), and the
//! `MemoryClient` that ties them together behind `MemoryStore`.

pub mod backend;
pub mod client;
pub mod embedding;
pub mod index;
pub mod milvus;

pub use backend::VectorBackend;
pub use client::{MemoryClient, MemoryError, MemoryStore};
pub use embedding::{DynEmbeddingService, EmbeddingService, MockEmbedding, OllamaEmbedding};
pub use index::VectorIndex;
pub use milvus::MilvusBackend;
