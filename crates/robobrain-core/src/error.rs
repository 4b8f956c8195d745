use std::fmt;

use thiserror::Error;

/// External service a request was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamService {
    /// Chat-completion endpoint (Ollama).
    Llm,
    /// Embedding endpoint used to vectorise memory text.
    Embedding,
    /// Vector database holding memory records (Milvus).
    VectorStore,
}

impl UpstreamService {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamService::Llm => "llm",
            UpstreamService::Embedding => "embedding",
            UpstreamService::VectorStore => "vector_store",
        }
    }
}

impl fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a call to an external service.
///
/// Boundary adapters classify every transport or payload problem into one of
/// these three kinds. Callers decide whether to degrade or propagate; adapters
/// never retry on their own.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    /// Connection refused, DNS failure, non-success status, or other transport error.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: UpstreamService,
        message: String,
    },

    /// The per-call timeout elapsed before a response arrived.
    #[error("{service} timed out")]
    Timeout { service: UpstreamService },

    /// The service answered but the payload could not be understood.
    #[error("{service} returned an invalid response: {message}")]
    InvalidResponse {
        service: UpstreamService,
        message: String,
    },
}

impl UpstreamError {
    pub fn unavailable(service: UpstreamService, message: impl Into<String>) -> Self {
        UpstreamError::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn timeout(service: UpstreamService) -> Self {
        UpstreamError::Timeout { service }
    }

    pub fn invalid_response(service: UpstreamService, message: impl Into<String>) -> Self {
        UpstreamError::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    /// Classify a `reqwest` failure for the given service.
    pub fn from_reqwest(service: UpstreamService, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::timeout(service)
        } else if err.is_decode() || err.is_body() {
            UpstreamError::invalid_response(service, err.to_string())
        } else {
            UpstreamError::unavailable(service, err.to_string())
        }
    }

    /// Stable snake_case name of the failure kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Unavailable { .. } => "unavailable",
            UpstreamError::Timeout { .. } => "timeout",
            UpstreamError::InvalidResponse { .. } => "invalid_response",
        }
    }

    pub fn service(&self) -> UpstreamService {
        match self {
            UpstreamError::Unavailable { service, .. }
            | UpstreamError::Timeout { service }
            | UpstreamError::InvalidResponse { service, .. } => *service,
        }
    }
}

/// Top-level error type for the robobrain service.
///
/// Subsystem crates define their own error types and convert into this one
/// where a single error type is needed (startup, configuration, the binary).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BrainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for BrainError {
    fn from(err: toml::de::Error) -> Self {
        BrainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BrainError {
    fn from(err: toml::ser::Error) -> Self {
        BrainError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BrainError {
    fn from(err: serde_json::Error) -> Self {
        BrainError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for robobrain operations.
pub type Result<T> = std::result::Result<T, BrainError>;
