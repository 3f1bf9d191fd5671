//! API request handlers

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::chat::{ChatError, ChatService, QuestionRequest};
use crate::config::defaults;
use crate::context::CacheStats;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub chat: Arc<ChatService>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self {
            chat,
            started_at: Instant::now(),
        }
    }
}

/// `{ "error": ... }` body used by every failure response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Chat
// ============================================================================

/// POST /cv/chat
pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<QuestionRequest>,
) -> Response {
    match state.chat.respond(request).await {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(ChatError::MissingQuestion) => {
            info!("Rejected chat request without a question");
            error_response(StatusCode::BAD_REQUEST, "Please provide a question")
        }
        Err(ChatError::Llm(e)) => {
            error!(error = %e, "Chat request failed");
            error_response(
                StatusCode::BAD_GATEWAY,
                "Error occurred while generating the response",
            )
        }
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store_enabled: bool,
    pub llm_backend: String,
    pub interaction_log_enabled: bool,
    pub scan_cache: Option<CacheStats>,
}

/// GET /health
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let chat = &state.chat;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        store_enabled: chat.has_store(),
        llm_backend: chat.llm_backend().to_string(),
        interaction_log_enabled: chat.interaction_log().is_some(),
        scan_cache: chat.retriever().cache_stats(),
    })
}

// ============================================================================
// Interaction History
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InteractionsQuery {
    pub limit: Option<usize>,
}

/// GET /cv/interactions?limit=N
pub async fn interactions(
    State(state): State<ApiState>,
    Query(query): Query<InteractionsQuery>,
) -> Response {
    let Some(log) = state.chat.interaction_log().cloned() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Interaction log not available",
        );
    };

    let limit = query
        .limit
        .unwrap_or(defaults::INTERACTIONS_DEFAULT_LIMIT)
        .min(defaults::INTERACTIONS_MAX_LIMIT);

    match tokio::task::spawn_blocking(move || log.recent(limit)).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => {
            error!(error = %e, "Interaction log read task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
        }
    }
}
