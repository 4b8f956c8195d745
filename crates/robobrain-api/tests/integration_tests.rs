//! Integration tests for the robobrain HTTP API.
//!
//! Every test builds its own router over an in-process vector index, the
//! mock embedder, and a scripted language model, so no Ollama or Milvus
//! instance is needed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use robobrain_api::create_router;
use robobrain_api::state::AppState;
use robobrain_chat::prompt::{CLARIFICATION_REPLY, FALLBACK_REPLY};
use robobrain_core::config::BrainConfig;
use robobrain_core::error::{UpstreamError, UpstreamService};
use robobrain_core::types::{MemoryQuery, MemoryRecord, ScoredMemory};
use robobrain_llm::{GenerationOptions, LanguageModel, Prompt};
use robobrain_memory::{MemoryClient, MemoryError, MemoryStore, MockEmbedding, VectorIndex};

// =============================================================================
// Helpers
// =============================================================================

const TEST_DIMENSION: usize = 64;

/// Model that always answers with the same text and counts its calls.
struct ScriptedModel {
    reply: String,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        _prompt: &Prompt,
        _options: &GenerationOptions,
    ) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Model whose server never answers.
struct UnreachableModel;

#[async_trait]
impl LanguageModel for UnreachableModel {
    async fn complete(
        &self,
        _prompt: &Prompt,
        _options: &GenerationOptions,
    ) -> Result<String, UpstreamError> {
        Err(UpstreamError::unavailable(
            UpstreamService::Llm,
            "connection refused",
        ))
    }
}

/// Memory store whose vector database always fails with the given error.
struct FailingMemory(UpstreamError);

#[async_trait]
impl MemoryStore for FailingMemory {
    async fn insert(&self, _record: MemoryRecord) -> Result<(), MemoryError> {
        Err(self.0.clone().into())
    }

    async fn search(&self, _query: &MemoryQuery) -> Result<Vec<ScoredMemory>, MemoryError> {
        Err(self.0.clone().into())
    }
}

fn mock_memory() -> Arc<dyn MemoryStore> {
    Arc::new(MemoryClient::new(
        Arc::new(MockEmbedding::new(TEST_DIMENSION)),
        Arc::new(VectorIndex::new()),
    ))
}

fn make_state_with(memory: Arc<dyn MemoryStore>, llm: Arc<dyn LanguageModel>) -> AppState {
    AppState::new(BrainConfig::default(), memory, llm).unwrap()
}

/// Create a fresh AppState with an in-process index and a scripted model.
fn make_state() -> AppState {
    make_state_with(
        mock_memory(),
        Arc::new(ScriptedModel::new("สวัสดีค่ะ ยินดีต้อนรับ")),
    )
}

fn make_app() -> axum::Router {
    create_router(make_state())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::delete(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    post_raw(uri, &body.to_string())
}

fn post_raw(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read the response body as bytes.
async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

async fn speak(app: &axum::Router, session_id: &str, text: &str, confidence: f64) -> Value {
    let resp = app
        .clone()
        .oneshot(post_json(
            "/speech/input",
            &json!({ "session_id": session_id, "text": text, "confidence": confidence }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

async fn session(app: &axum::Router, session_id: &str) -> Value {
    let resp = app
        .clone()
        .oneshot(get(&format!("/session/{}", session_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await["session"].clone()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = make_app();
    let resp = app.oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["status"], "running");
    assert_eq!(json["service"], "robobrain");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["model"], BrainConfig::default().llm.model);
    assert_eq!(json["active_sessions"], 0);
}

#[tokio::test]
async fn test_health_counts_sessions() {
    let app = make_app();
    speak(&app, "robot-1", "สวัสดีค่ะ", 0.95).await;
    speak(&app, "robot-2", "สวัสดีค่ะ", 0.95).await;

    let json = body_json(app.oneshot(get("/")).await.unwrap()).await;
    assert_eq!(json["active_sessions"], 2);
}

// =============================================================================
// Context update
// =============================================================================

#[tokio::test]
async fn test_context_update_creates_session() {
    let app = make_app();
    let resp = app
        .clone()
        .oneshot(post_json(
            "/context/update",
            &json!({
                "session_id": "robot-1",
                "student_id": "6401234",
                "student_name": "สมชาย",
                "location": "อาคาร 1",
                "environment": { "temperature": 31.5, "crowded": true }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["session_id"], "robot-1");
    assert_eq!(json["message"], "Context updated");

    let s = session(&app, "robot-1").await;
    assert_eq!(s["student_id"], "6401234");
    assert_eq!(s["student_name"], "สมชาย");
    assert_eq!(s["current_location"], "อาคาร 1");
    assert_eq!(s["environment"]["temperature"], 31.5);
    assert_eq!(s["environment"]["crowded"], true);
    assert_eq!(s["history"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_context_update_merges_fields() {
    let app = make_app();
    app.clone()
        .oneshot(post_json(
            "/context/update",
            &json!({
                "session_id": "robot-1",
                "student_name": "สมชาย",
                "location": "อาคาร 1",
                "environment_data": { "time_of_day": "morning" }
            }),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json(
            "/context/update",
            &json!({
                "session_id": "robot-1",
                "location": "อาคาร 3",
                "environment": { "noise_level": 2 }
            }),
        ))
        .await
        .unwrap();

    let s = session(&app, "robot-1").await;
    assert_eq!(s["student_name"], "สมชาย");
    assert_eq!(s["current_location"], "อาคาร 3");
    assert_eq!(s["environment"]["time_of_day"], "morning");
    assert_eq!(s["environment"]["noise_level"], 2);
}

#[tokio::test]
async fn test_context_update_requires_session_id() {
    let app = make_app();
    let resp = app
        .oneshot(post_json("/context/update", &json!({ "session_id": "  " })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "bad_request");
}

#[tokio::test]
async fn test_context_update_malformed_json() {
    let app = make_app();
    let resp = app
        .oneshot(post_raw("/context/update", "{not json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "bad_request");
    assert!(!json["message"].as_str().unwrap().is_empty());
}

// =============================================================================
// Speech input
// =============================================================================

#[tokio::test]
async fn test_speech_conversation() {
    let app = make_app();
    let json = speak(&app, "robot-1", "วันนี้อากาศเป็นยังไงบ้าง", 0.92).await;

    assert_eq!(json["session_id"], "robot-1");
    assert_eq!(json["intent"], "conversation");
    assert_eq!(json["response_text"], "สวัสดีค่ะ ยินดีต้อนรับ");
    assert_eq!(json["should_navigate"], false);
    assert!(json["navigation_goal"].is_null());

    let history = session(&app, "robot-1").await["history"].clone();
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[0]["text"], "วันนี้อากาศเป็นยังไงบ้าง");
    assert_eq!(history[1]["role"], "assistant");
}

#[tokio::test]
async fn test_speech_navigation() {
    let model = Arc::new(ScriptedModel::new("unused"));
    let app = create_router(make_state_with(mock_memory(), model.clone()));

    let json = speak(&app, "robot-1", "พาไปห้องสมุด", 0.9).await;
    assert_eq!(json["intent"], "navigation");
    assert_eq!(json["should_navigate"], true);
    assert_eq!(json["navigation_goal"]["target_location"], "ห้องสมุด");
    assert_eq!(json["navigation_goal"]["priority"], "normal");
    assert!(json["response_text"].as_str().unwrap().contains("ห้องสมุด"));

    // Navigation is answered without the model.
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_speech_navigation_without_destination() {
    let app = make_app();
    let json = speak(&app, "robot-1", "พาไป", 0.9).await;
    assert_eq!(json["intent"], "navigation");
    assert_eq!(json["should_navigate"], false);
    assert!(json["navigation_goal"].is_null());
}

#[tokio::test]
async fn test_speech_low_confidence_asks_to_repeat() {
    let model = Arc::new(ScriptedModel::new("unused"));
    let app = create_router(make_state_with(mock_memory(), model.clone()));

    let json = speak(&app, "robot-1", "พาไปห้องสมุด", 0.4).await;
    assert_eq!(json["intent"], "clarification");
    assert_eq!(json["response_text"], CLARIFICATION_REPLY);
    assert_eq!(json["should_navigate"], false);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_speech_llm_down_returns_fallback() {
    let app = create_router(make_state_with(mock_memory(), Arc::new(UnreachableModel)));

    let json = speak(&app, "robot-1", "สวัสดีค่ะ", 0.95).await;
    assert_eq!(json["intent"], "conversation");
    assert_eq!(json["response_text"], FALLBACK_REPLY);

    // Only the user turn is recorded.
    let history = session(&app, "robot-1").await["history"].clone();
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_speech_memory_down_still_answers() {
    let memory: Arc<dyn MemoryStore> = Arc::new(FailingMemory(UpstreamError::unavailable(
        UpstreamService::VectorStore,
        "connection refused",
    )));
    let app = create_router(make_state_with(
        memory,
        Arc::new(ScriptedModel::new("ได้ค่ะ")),
    ));

    let json = speak(&app, "robot-1", "ห้องสมุดเปิดกี่โมง", 0.95).await;
    assert_eq!(json["intent"], "conversation");
    assert_eq!(json["response_text"], "ได้ค่ะ");
}

#[tokio::test]
async fn test_speech_history_is_bounded() {
    let app = make_app();
    for i in 0..8 {
        speak(&app, "robot-1", &format!("คำถามที่ {}", i), 0.95).await;
    }
    let history = session(&app, "robot-1").await["history"].clone();
    let history = history.as_array().unwrap();
    let limit = BrainConfig::default().session.history_limit;
    assert_eq!(history.len(), limit);
    assert_eq!(history.last().unwrap()["role"], "assistant");
}

#[tokio::test]
async fn test_speech_rejects_empty_text() {
    let app = make_app();
    let resp = app
        .oneshot(post_json(
            "/speech/input",
            &json!({ "session_id": "robot-1", "text": "   ", "confidence": 0.9 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_configured_model() {
    let mut config = BrainConfig::default();
    config.llm.model = "llama3:8b".to_string();
    let state = AppState::new(config, mock_memory(), Arc::new(ScriptedModel::new("x"))).unwrap();

    let json = body_json(create_router(state).oneshot(get("/")).await.unwrap()).await;
    assert_eq!(json["model"], "llama3:8b");
}

#[tokio::test]
async fn test_speech_rejection_leaves_no_session() {
    let app = make_app();
    let resp = app
        .clone()
        .oneshot(post_json(
            "/speech/input",
            &json!({ "session_id": "robot-9", "text": "สวัสดี", "confidence": -0.2 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "bad_request");

    let resp = app.oneshot(get("/session/robot-9")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_speech_rejects_out_of_range_confidence() {
    let app = make_app();
    let resp = app
        .oneshot(post_json(
            "/speech/input",
            &json!({ "session_id": "robot-1", "text": "สวัสดี", "confidence": 1.5 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_speech_rejects_missing_field() {
    let app = make_app();
    let resp = app
        .oneshot(post_json(
            "/speech/input",
            &json!({ "session_id": "robot-1", "text": "สวัสดี" }),
        ))
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
    assert_eq!(body_json(resp).await["error"], "bad_request");
}

// =============================================================================
// Memory
// =============================================================================

#[tokio::test]
async fn test_memory_insert_and_search() {
    let app = make_app();
    for (text, memory_type, student) in [
        ("ห้องสมุดเปิด 8 โมงถึง 2 ทุ่ม", "knowledge", None),
        ("วันนี้สมชายไปเรียนวิชาฟิสิกส์", "diary", Some("6401234")),
        ("โรงอาหารอยู่ชั้น 1 อาคาร 2", "navigation", None),
    ] {
        let resp = app
            .clone()
            .oneshot(post_json(
                "/memory/insert",
                &json!({ "text": text, "memory_type": memory_type, "student_id": student }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "Memory inserted");
    }

    let resp = app
        .clone()
        .oneshot(post_json(
            "/memory/search",
            &json!({ "query": "ห้องสมุดเปิด 8 โมงถึง 2 ทุ่ม", "top_k": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["count"], 2);
    let memories = json["memories"].as_array().unwrap();
    assert_eq!(memories[0]["text"], "ห้องสมุดเปิด 8 โมงถึง 2 ทุ่ม");
    assert_eq!(memories[0]["memory_type"], "knowledge");
    assert!(memories[0]["score"].as_f64().unwrap() > 0.75);
    assert!(memories[0]["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_memory_search_filters() {
    let app = make_app();
    for (text, memory_type, student) in [
        ("บันทึกของนักศึกษา A", "diary", "A"),
        ("บันทึกของนักศึกษา B", "diary", "B"),
        ("ข้อมูลทั่วไปของ A", "knowledge", "A"),
    ] {
        app.clone()
            .oneshot(post_json(
                "/memory/insert",
                &json!({ "text": text, "memory_type": memory_type, "student_id": student }),
            ))
            .await
            .unwrap();
    }

    let resp = app
        .oneshot(post_json(
            "/memory/search",
            &json!({ "query": "บันทึก", "memory_type": "diary", "student_id": "A" }),
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["memories"][0]["text"], "บันทึกของนักศึกษา A");
    assert_eq!(json["memories"][0]["student_id"], "A");
}

#[tokio::test]
async fn test_memory_insert_keeps_explicit_timestamp() {
    let app = make_app();
    app.clone()
        .oneshot(post_json(
            "/memory/insert",
            &json!({ "text": "เก่ามาก", "memory_type": "diary", "timestamp": 1700000000 }),
        ))
        .await
        .unwrap();

    let json = body_json(
        app.oneshot(post_json("/memory/search", &json!({ "query": "เก่ามาก" })))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["memories"][0]["timestamp"], 1700000000);
    assert!(json["memories"][0]["student_id"].is_null());
}

#[tokio::test]
async fn test_memory_insert_rejects_empty_text() {
    let app = make_app();
    let resp = app
        .oneshot(post_json(
            "/memory/insert",
            &json!({ "text": "", "memory_type": "diary" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_memory_insert_rejects_unknown_type() {
    let app = make_app();
    let resp = app
        .oneshot(post_json(
            "/memory/insert",
            &json!({ "text": "x", "memory_type": "gossip" }),
        ))
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
    assert_eq!(body_json(resp).await["error"], "bad_request");
}

#[tokio::test]
async fn test_memory_search_rejects_bad_top_k() {
    let app = make_app();
    for top_k in [0, 101] {
        let resp = app
            .clone()
            .oneshot(post_json(
                "/memory/search",
                &json!({ "query": "ห้องสมุด", "top_k": top_k }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_memory_search_rejects_blank_query() {
    let app = make_app();
    let resp = app
        .oneshot(post_json("/memory/search", &json!({ "query": " " })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_memory_upstream_failures_map_to_gateway_errors() {
    let cases = [
        (
            UpstreamError::unavailable(UpstreamService::VectorStore, "refused"),
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
        ),
        (
            UpstreamError::timeout(UpstreamService::Embedding),
            StatusCode::GATEWAY_TIMEOUT,
            "gateway_timeout",
        ),
        (
            UpstreamError::invalid_response(UpstreamService::VectorStore, "garbage"),
            StatusCode::BAD_GATEWAY,
            "bad_gateway",
        ),
    ];

    for (err, status, code) in cases {
        let app = create_router(make_state_with(
            Arc::new(FailingMemory(err.clone())),
            Arc::new(ScriptedModel::new("unused")),
        ));

        let resp = app
            .clone()
            .oneshot(post_json(
                "/memory/insert",
                &json!({ "text": "x", "memory_type": "knowledge" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), status);
        assert_eq!(body_json(resp).await["error"], code);

        let resp = app
            .oneshot(post_json("/memory/search", &json!({ "query": "x" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), status);
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_get_unknown_session() {
    let app = make_app();
    let resp = app.oneshot(get("/session/nobody")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "not_found");
}

#[tokio::test]
async fn test_delete_session() {
    let app = make_app();
    speak(&app, "robot-1", "สวัสดีค่ะ", 0.95).await;

    let resp = app.clone().oneshot(delete("/session/robot-1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["message"], "Session robot-1 cleared");

    let resp = app.clone().oneshot(get("/session/robot-1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.oneshot(delete("/session/robot-1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let app = make_app();
    app.clone()
        .oneshot(post_json(
            "/context/update",
            &json!({ "session_id": "robot-1", "student_name": "สมชาย" }),
        ))
        .await
        .unwrap();
    speak(&app, "robot-2", "สวัสดีค่ะ", 0.95).await;

    let s1 = session(&app, "robot-1").await;
    let s2 = session(&app, "robot-2").await;
    assert_eq!(s1["history"].as_array().unwrap().len(), 0);
    assert!(s2["student_name"].is_null());
}

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn test_cors_preflight() {
    let app = make_app();
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/speech/input")
        .header("origin", "http://robot.local")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_route() {
    let app = make_app();
    let resp = app.oneshot(get("/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
