//! Route handler functions for all API endpoints.
//!
//! Request bodies are typed and validated here; the session store, intent
//! router, and memory store do the work.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use robobrain_core::types::{
    EnvValue, Intent, MemoryQuery, MemoryRecord, MemoryType, NavigationGoal, ScoredMemory,
    Session, SessionUpdate,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Maximum session identifier length in characters.
const MAX_SESSION_ID_CHARS: usize = 128;
const DEFAULT_TOP_K: usize = 5;
const MAX_TOP_K: usize = 100;

fn validate_session_id(session_id: &str) -> Result<(), ApiError> {
    if session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("'session_id' must not be empty".into()));
    }
    if session_id.chars().count() > MAX_SESSION_ID_CHARS {
        return Err(ApiError::BadRequest(format!(
            "'session_id' exceeds {} characters",
            MAX_SESSION_ID_CHARS
        )));
    }
    Ok(())
}

/// Treat blank optional strings as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ContextUpdateRequest {
    pub session_id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, alias = "environment_data")]
    pub environment: Option<BTreeMap<String, EnvValue>>,
}

#[derive(Debug, Deserialize)]
pub struct SpeechInputRequest {
    pub session_id: String,
    pub text: String,
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
pub struct MemoryInsertRequest {
    pub text: String,
    pub memory_type: MemoryType,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MemorySearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub memory_type: Option<MemoryType>,
    #[serde(default)]
    pub student_id: Option<String>,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// Configured chat model.
    pub model: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContextUpdateResponse {
    pub status: String,
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub response_text: String,
    pub intent: Intent,
    pub should_navigate: bool,
    pub navigation_goal: Option<NavigationGoal>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryHit {
    pub text: String,
    pub memory_type: MemoryType,
    pub student_id: Option<String>,
    pub timestamp: i64,
    pub score: f64,
}

impl From<ScoredMemory> for MemoryHit {
    fn from(m: ScoredMemory) -> Self {
        Self {
            text: m.record.text,
            memory_type: m.record.memory_type,
            student_id: m.record.student_id,
            timestamp: m.record.timestamp,
            score: m.score,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemorySearchResponse {
    pub status: String,
    pub count: usize,
    pub memories: Vec<MemoryHit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub status: String,
    pub session: Session,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET / - Health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running".to_string(),
        service: "robobrain".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.config.llm.model.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.sessions.len(),
    })
}

/// POST /context/update - Merge identity, location, and environment into a session.
pub async fn update_context(
    State(state): State<AppState>,
    payload: Result<Json<ContextUpdateRequest>, JsonRejection>,
) -> Result<Json<ContextUpdateResponse>, ApiError> {
    let Json(req) = payload?;
    validate_session_id(&req.session_id)?;

    let update = SessionUpdate {
        student_id: non_blank(req.student_id),
        student_name: non_blank(req.student_name),
        location: non_blank(req.location),
        environment: req.environment,
    };
    state.sessions.upsert(&req.session_id, update)?;

    Ok(Json(ContextUpdateResponse {
        status: "success".to_string(),
        session_id: req.session_id,
        message: "Context updated".to_string(),
    }))
}

/// POST /speech/input - Answer a transcribed utterance.
pub async fn speech_input(
    State(state): State<AppState>,
    payload: Result<Json<SpeechInputRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;
    validate_session_id(&req.session_id)?;

    let result = match state
        .router
        .route(&req.session_id, &req.text, req.confidence)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            warn!(
                session_id = %req.session_id,
                error_kind = e.kind(),
                error = %e,
                "Speech input rejected"
            );
            return Err(e.into());
        }
    };

    info!(
        session_id = %req.session_id,
        intent = result.intent.as_str(),
        "Speech input handled"
    );

    Ok(Json(ChatResponse {
        session_id: req.session_id,
        should_navigate: result.should_navigate(),
        response_text: result.response_text,
        intent: result.intent,
        navigation_goal: result.navigation_goal,
    }))
}

/// POST /memory/insert - Store a memory record.
pub async fn memory_insert(
    State(state): State<AppState>,
    payload: Result<Json<MemoryInsertRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = payload?;

    let mut record = MemoryRecord::new(req.text, req.memory_type);
    record.student_id = non_blank(req.student_id);
    if let Some(timestamp) = req.timestamp {
        record.timestamp = timestamp;
    }
    state.memory.insert(record).await?;

    Ok(Json(StatusResponse {
        status: "success".to_string(),
        message: "Memory inserted".to_string(),
    }))
}

/// POST /memory/search - Similarity search over stored memories.
pub async fn memory_search(
    State(state): State<AppState>,
    payload: Result<Json<MemorySearchRequest>, JsonRejection>,
) -> Result<Json<MemorySearchResponse>, ApiError> {
    let Json(req) = payload?;
    if req.query.trim().is_empty() {
        return Err(ApiError::BadRequest("'query' must not be empty".into()));
    }
    if !(1..=MAX_TOP_K).contains(&req.top_k) {
        return Err(ApiError::BadRequest(format!(
            "'top_k' must be between 1 and {}",
            MAX_TOP_K
        )));
    }

    let query = MemoryQuery {
        text: req.query,
        top_k: req.top_k,
        memory_type: req.memory_type,
        student_id: non_blank(req.student_id),
    };
    let memories: Vec<MemoryHit> = state
        .memory
        .search(&query)
        .await?
        .into_iter()
        .map(MemoryHit::from)
        .collect();

    debug!(count = memories.len(), "Memory search served");
    Ok(Json(MemorySearchResponse {
        status: "success".to_string(),
        count: memories.len(),
        memories,
    }))
}

/// GET /session/{id} - Current session state.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.get(&session_id)?;
    Ok(Json(SessionResponse {
        status: "success".to_string(),
        session,
    }))
}

/// DELETE /session/{id} - Clear a session.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.sessions.delete(&session_id)?;
    Ok(Json(StatusResponse {
        status: "success".to_string(),
        message: format!("Session {} cleared", session_id),
    }))
}
