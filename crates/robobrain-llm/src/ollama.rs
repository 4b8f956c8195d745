//! Ollama chat client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use robobrain_core::config::LlmConfig;
use robobrain_core::error::{BrainError, UpstreamError, UpstreamService};

use crate::client::{GenerationOptions, LanguageModel, Prompt};

const SERVICE: UpstreamService = UpstreamService::Llm;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// [`LanguageModel`] backed by an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self, BrainError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrainError::Config(format!("LLM HTTP client: {}", e)))?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Names of the models installed on the server.
    pub async fn available_models(&self) -> Result<Vec<String>, UpstreamError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::unavailable(
                SERVICE,
                format!("HTTP {} listing models", status.as_u16()),
            ));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Log whether the configured model is installed. Returns `true` if it is.
    pub async fn check_model(&self) -> Result<bool, UpstreamError> {
        let models = self.available_models().await?;
        let found = models.iter().any(|m| m == &self.model);
        if found {
            info!(model = %self.model, "Connected to Ollama, model ready");
        } else {
            warn!(model = %self.model, available = ?models, "Configured model not found on Ollama");
        }
        Ok(found)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(
        &self,
        prompt: &Prompt,
        options: &GenerationOptions,
    ) -> Result<String, UpstreamError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;

        let content = parsed.message.content.trim();
        if content.is_empty() {
            return Err(UpstreamError::invalid_response(SERVICE, "empty reply"));
        }

        debug!(model = %self.model, chars = content.chars().count(), "LLM reply received");
        Ok(content.to_string())
    }
}
