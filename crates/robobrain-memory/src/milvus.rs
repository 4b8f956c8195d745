//! Milvus vector store over the REST v2 API.
//!
//! Records live in a single collection with the schema created by
//! [`MilvusBackend::ensure_collection`]: an auto-id primary key, a float
//! vector `embedding` indexed with IVF_FLAT over inner product, and scalar
//! fields for the record metadata. Records without a student are stored with
//! an empty `student_id`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use robobrain_core::config::VectorStoreConfig;
use robobrain_core::error::{BrainError, UpstreamError, UpstreamService};
use robobrain_core::types::{MemoryQuery, MemoryRecord, MemoryType, ScoredMemory};

use crate::backend::VectorBackend;

const SERVICE: UpstreamService = UpstreamService::VectorStore;

/// VarChar limit of the `text` field, in bytes. Thai text is three bytes per
/// character in UTF-8, so this holds the maximum record length.
const TEXT_MAX_BYTES: u32 = 8000;
const TAG_MAX_BYTES: u32 = 64;
const NLIST: u32 = 128;
const NPROBE: u32 = 10;

const OUTPUT_FIELDS: [&str; 4] = ["text", "memory_type", "student_id", "timestamp"];

#[derive(Debug, Deserialize)]
struct MilvusResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    distance: f64,
    text: String,
    memory_type: String,
    #[serde(default)]
    student_id: Option<String>,
    #[serde(default)]
    timestamp: i64,
}

/// Client for a Milvus collection of memory records.
#[derive(Debug, Clone)]
pub struct MilvusBackend {
    base_url: String,
    collection: String,
    token: Option<String>,
    client: Client,
}

impl MilvusBackend {
    pub fn new(config: &VectorStoreConfig) -> Result<Self, BrainError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrainError::Config(format!("vector store HTTP client: {}", e)))?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            token: config.token.clone(),
            client,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn post(&self, endpoint: &str) -> RequestBuilder {
        let request = self
            .client
            .post(format!("{}/v2/vectordb/{}", self.base_url, endpoint));
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and unwrap the Milvus `{code, message, data}` envelope.
    async fn call(&self, endpoint: &str, body: Value) -> Result<Value, UpstreamError> {
        let response = self
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::unavailable(
                SERVICE,
                format!("HTTP {}: {}", status.as_u16(), text),
            ));
        }

        let parsed: MilvusResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, &e))?;
        if parsed.code != 0 {
            return Err(UpstreamError::unavailable(
                SERVICE,
                format!(
                    "{} failed with code {}: {}",
                    endpoint,
                    parsed.code,
                    parsed.message.unwrap_or_default()
                ),
            ));
        }
        Ok(parsed.data)
    }

    /// Create the collection and its vector index unless it already exists.
    ///
    /// Returns `true` when the collection was created.
    pub async fn ensure_collection(&self, dimension: usize) -> Result<bool, UpstreamError> {
        let data = self
            .call(
                "collections/has",
                json!({ "collectionName": self.collection }),
            )
            .await?;
        if data.get("has").and_then(Value::as_bool).unwrap_or(false) {
            debug!(collection = %self.collection, "Milvus collection exists");
            return Ok(false);
        }

        self.call("collections/create", self.create_collection_body(dimension))
            .await?;
        info!(collection = %self.collection, dimension, "Created Milvus collection");
        Ok(true)
    }

    fn create_collection_body(&self, dimension: usize) -> Value {
        json!({
            "collectionName": self.collection,
            "schema": {
                "autoId": true,
                "enableDynamicField": false,
                "fields": [
                    { "fieldName": "id", "dataType": "Int64", "isPrimary": true },
                    {
                        "fieldName": "embedding",
                        "dataType": "FloatVector",
                        "elementTypeParams": { "dim": dimension.to_string() }
                    },
                    {
                        "fieldName": "text",
                        "dataType": "VarChar",
                        "elementTypeParams": { "max_length": TEXT_MAX_BYTES }
                    },
                    {
                        "fieldName": "memory_type",
                        "dataType": "VarChar",
                        "elementTypeParams": { "max_length": TAG_MAX_BYTES }
                    },
                    {
                        "fieldName": "student_id",
                        "dataType": "VarChar",
                        "elementTypeParams": { "max_length": TAG_MAX_BYTES * 4 }
                    },
                    { "fieldName": "timestamp", "dataType": "Int64" }
                ]
            },
            "indexParams": [{
                "fieldName": "embedding",
                "indexName": "embedding_ivf_flat",
                "metricType": "IP",
                "indexType": "IVF_FLAT",
                "params": { "nlist": NLIST }
            }]
        })
    }
}

/// Quote a string for a Milvus boolean filter expression.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Build the filter expression for a query. Empty when nothing is filtered.
fn filter_expression(query: &MemoryQuery) -> String {
    let mut clauses = Vec::new();
    if let Some(memory_type) = query.memory_type {
        clauses.push(format!("memory_type == {}", quote(memory_type.as_str())));
    }
    if let Some(ref student_id) = query.student_id {
        clauses.push(format!("student_id == {}", quote(student_id)));
    }
    clauses.join(" and ")
}

fn hit_to_memory(hit: SearchHit) -> Result<ScoredMemory, UpstreamError> {
    let memory_type = MemoryType::parse(&hit.memory_type).ok_or_else(|| {
        UpstreamError::invalid_response(
            SERVICE,
            format!("unknown memory_type '{}'", hit.memory_type),
        )
    })?;
    Ok(ScoredMemory {
        record: MemoryRecord {
            text: hit.text,
            memory_type,
            student_id: hit.student_id.filter(|s| !s.is_empty()),
            timestamp: hit.timestamp,
        },
        score: hit.distance,
    })
}

#[async_trait]
impl VectorBackend for MilvusBackend {
    fn name(&self) -> &'static str {
        "milvus"
    }

    async fn insert(&self, embedding: Vec<f32>, record: &MemoryRecord) -> Result<(), UpstreamError> {
        let body = json!({
            "collectionName": self.collection,
            "data": [{
                "embedding": embedding,
                "text": record.text,
                "memory_type": record.memory_type.as_str(),
                "student_id": record.student_id.as_deref().unwrap_or(""),
                "timestamp": record.timestamp,
            }]
        });
        self.call("entities/insert", body).await?;
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        query: &MemoryQuery,
    ) -> Result<Vec<ScoredMemory>, UpstreamError> {
        let mut body = json!({
            "collectionName": self.collection,
            "data": [embedding],
            "annsField": "embedding",
            "limit": query.top_k,
            "outputFields": OUTPUT_FIELDS,
            "searchParams": {
                "metricType": "IP",
                "params": { "nprobe": NPROBE }
            }
        });
        let filter = filter_expression(query);
        if !filter.is_empty() {
            body["filter"] = Value::String(filter);
        }

        let data = self.call("entities/search", body).await?;
        let hits: Vec<SearchHit> = serde_json::from_value(data)
            .map_err(|e| UpstreamError::invalid_response(SERVICE, e.to_string()))?;

        let mut memories = hits
            .into_iter()
            .map(hit_to_memory)
            .collect::<Result<Vec<_>, _>>()?;
        memories.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(memories)
    }
}
