use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BrainError, Result};

/// Top-level configuration for the robobrain service.
///
/// Loaded from `robobrain.toml` by default. Every section falls back to its
/// defaults, so a partial file only needs the values that differ.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrainConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

impl BrainConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BrainConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or is invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f64| {
            if value.is_finite() && (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(BrainError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )))
            }
        };
        unit("speech.confidence_threshold", self.speech.confidence_threshold)?;
        unit("memory.similarity_threshold", self.memory.similarity_threshold)?;

        if self.embedding.dimension == 0 {
            return Err(BrainError::Config(
                "embedding.dimension must be greater than zero".into(),
            ));
        }
        if self.memory.retrieval_top_k == 0 {
            return Err(BrainError::Config(
                "memory.retrieval_top_k must be greater than zero".into(),
            ));
        }
        for (name, secs) in [
            ("llm.timeout_secs", self.llm.timeout_secs),
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("vector_store.timeout_secs", self.vector_store.timeout_secs),
        ] {
            if secs == 0 {
                return Err(BrainError::Config(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        if !self.llm.temperature.is_finite() || self.llm.temperature < 0.0 {
            return Err(BrainError::Config(format!(
                "llm.temperature must be non-negative, got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Address the HTTP server binds to.
    pub host: String,
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Chat-completion model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Ollama server.
    pub api_url: String,
    pub model: String,
    pub temperature: f64,
    /// Maximum tokens generated per reply.
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Ask the model for a JSON reply `{response, intent, location}`.
    pub structured_replies: bool,
    /// Replaces the built-in persona when set.
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434".to_string(),
            model: "typhoon:7b-instruct".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            timeout_secs: 30,
            structured_replies: false,
            system_prompt: None,
        }
    }
}

/// Which embedding implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Ollama,
    /// Deterministic hash-based vectors, for development without a model server.
    Mock,
}

/// Embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub api_url: String,
    pub model: String,
    /// Vector dimension; must match the vector store schema.
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            api_url: "http://localhost:11434".to_string(),
            model: "bge-m3".to_string(),
            dimension: 1024,
            timeout_secs: 10,
        }
    }
}

/// Which vector store implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreBackend {
    #[default]
    Milvus,
    /// Process-local index; contents are lost on restart.
    InMemory,
}

/// Vector database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorStoreBackend,
    /// Base URL of the Milvus REST endpoint.
    pub url: String,
    pub collection: String,
    /// Bearer token, if the server requires authentication.
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorStoreBackend::Milvus,
            url: "http://localhost:19530".to_string(),
            collection: "robot_memory".to_string(),
            token: None,
            timeout_secs: 10,
        }
    }
}

/// Speech input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Transcripts below this recogniser confidence get a clarification reply.
    pub confidence_threshold: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.70,
        }
    }
}

/// Memory retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub retrieval_top_k: usize,
    /// Minimum similarity for a memory to be placed in the prompt.
    pub similarity_threshold: f64,
    /// Maximum number of memories placed in the prompt.
    pub context_limit: usize,
    /// Restrict retrieval to the session's student when known.
    pub filter_by_student: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: 5,
            similarity_threshold: 0.75,
            context_limit: 3,
            filter_by_student: false,
        }
    }
}

/// Session history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Turns retained per session; oldest are evicted first.
    pub history_limit: usize,
    /// Trailing turns included in the prompt.
    pub prompt_turns: usize,
    pub record_clarification_turns: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            prompt_turns: 3,
            record_clarification_turns: false,
        }
    }
}

/// Navigation intent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Phrases that mark an utterance as a navigation request. The text after
    /// the phrase is taken as the destination.
    pub triggers: Vec<String>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            triggers: [
                "พาไปที่",
                "พาไป",
                "นำทางไปที่",
                "นำทางไป",
                "ไปที่",
                "take me to",
                "navigate to",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}
