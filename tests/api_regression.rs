//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! every endpoint using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port, no real LLM.

use persona_chat::api::{create_app, ApiState};
use persona_chat::config::RetrievalConfig;
use persona_chat::context::ContextRetriever;
use persona_chat::llm::{LlmClient, LlmError};
use persona_chat::storage::InteractionLog;
use persona_chat::store::{KeyValueStore, MemoryStore};
use persona_chat::ChatService;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Mock LLM recording prompts
struct MockLlm {
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl MockLlm {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, _model: &str, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.to_string());
        if self.fail {
            Err(LlmError::EmptyResponse)
        } else {
            Ok("Head to Chandni Chowk!".to_string())
        }
    }

    fn backend_name(&self) -> &'static str {
        "Mock"
    }
}

fn context_store() -> Arc<dyn KeyValueStore> {
    let store = MemoryStore::new();
    store.insert("delhi:food:chaat", "Chandni Chowk");
    store.insert("delhi:food:paratha", "Paranthe Wali Gali");
    Arc::new(store)
}

fn chat_service(llm: Arc<MockLlm>) -> ChatService {
    let retriever = ContextRetriever::from_config(&RetrievalConfig::default()).unwrap();
    ChatService::new(Arc::new(retriever), Some(context_store()), llm)
}

fn app_with(service: ChatService) -> Router {
    create_app(ApiState::new(Arc::new(service)))
}

fn post_chat(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/cv/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// POST /cv/chat
// ============================================================================

#[tokio::test]
async fn test_chat_returns_response_and_timings() {
    let llm = MockLlm::new(false);
    let app = app_with(chat_service(Arc::clone(&llm)));

    let resp = app
        .oneshot(post_chat(r#"{"question": "Where can I find good street food?"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["response"], "Head to Chandni Chowk!");
    for timing in ["cit", "drt", "rgt"] {
        assert!(json[timing].as_f64().unwrap() >= 0.0, "{timing} missing");
    }

    let prompts = llm.prompts.lock();
    assert!(prompts[0].contains("delhi:food:chaat - Chandni Chowk"));
    assert!(prompts[0].contains("delhi:food:paratha - Paranthe Wali Gali"));
}

#[tokio::test]
async fn test_chat_passes_persona_fields_into_prompt() {
    let llm = MockLlm::new(false);
    let app = app_with(chat_service(Arc::clone(&llm)));

    let body = serde_json::json!({
        "question": "hello there",
        "personality": "delhi",
        "personality_prompt": "You are the city of Delhi.",
        "last_three_responses": "Talked about the metro."
    });
    let resp = app.oneshot(post_chat(&body.to_string())).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let prompts = llm.prompts.lock();
    assert!(prompts[0].contains("You are the city of Delhi."));
    assert!(prompts[0].contains("Talked about the metro."));
    assert!(prompts[0].contains("Answer the user question: hello there"));
}

#[tokio::test]
async fn test_chat_blank_question_is_400() {
    for body in [r#"{"question": "   "}"#, r#"{}"#, r#"{"question": null}"#] {
        let llm = MockLlm::new(false);
        let app = app_with(chat_service(Arc::clone(&llm)));

        let resp = app.oneshot(post_chat(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
        let json = json_body(resp).await;
        assert_eq!(json["error"], "Please provide a question");
        assert_eq!(llm.calls(), 0);
    }
}

#[tokio::test]
async fn test_chat_llm_failure_is_502() {
    let app = app_with(chat_service(MockLlm::new(true)));

    let resp = app
        .oneshot(post_chat(r#"{"question": "What should I eat?"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(resp).await;
    assert_eq!(json["error"], "Error occurred while generating the response");
}

#[tokio::test]
async fn test_chat_without_store_still_answers() {
    let llm = MockLlm::new(false);
    let retriever = ContextRetriever::from_config(&RetrievalConfig::default()).unwrap();
    let service = ChatService::new(Arc::new(retriever), None, Arc::clone(&llm) as Arc<dyn LlmClient>);

    let resp = app_with(service)
        .oneshot(post_chat(r#"{"question": "Where can I find good street food?"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["drt"], 0.0);
    assert!(llm.prompts.lock()[0].contains("relative information about you: \n"));
}

// ============================================================================
// GET /health
// ============================================================================

#[tokio::test]
async fn test_health_returns_json_object() {
    let app = app_with(chat_service(MockLlm::new(false)));

    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store_enabled"], true);
    assert_eq!(json["llm_backend"], "Mock");
    assert_eq!(json["interaction_log_enabled"], false);
    assert!(json["scan_cache"].is_object());
}

// ============================================================================
// GET /cv/interactions
// ============================================================================

#[tokio::test]
async fn test_interactions_unavailable_without_log() {
    let app = app_with(chat_service(MockLlm::new(false)));

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/cv/interactions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_interactions_lists_logged_chats() {
    let dir = tempfile::tempdir().unwrap();
    let log = InteractionLog::open(dir.path()).unwrap();
    let app = app_with(chat_service(MockLlm::new(false)).with_interaction_log(log.clone()));

    for question in ["Where can I find good street food?", "hello there"] {
        let resp = app.clone().oneshot(post_chat(&serde_json::json!({ "question": question }).to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    // Writes are fire-and-forget
    for _ in 0..100 {
        if log.count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(log.count(), 2);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/cv/interactions?limit=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["bot_response"], "Head to Chandni Chowk!");
    assert_eq!(rows[0]["personality"], "delhi");
    assert!(rows[0]["id"].is_string());
}

// ============================================================================
// Middleware
// ============================================================================

#[tokio::test]
async fn test_cors_preflight_allows_any_origin_by_default() {
    let app = app_with(chat_service(MockLlm::new(false)));

    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/cv/chat")
                .header(header::ORIGIN, "https://example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = app_with(chat_service(MockLlm::new(false)));
    let resp = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
