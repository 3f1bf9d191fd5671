//! API route definitions
//!
//! - POST /cv/chat - persona answer with cit/drt/rgt timings
//! - GET /cv/interactions - recent logged exchanges, newest first
//! - GET /health - liveness and component status

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ApiState};

/// Chat endpoints under `/cv`
pub fn chat_routes(state: ApiState) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/interactions", get(handlers::interactions))
        .with_state(state)
}

/// Health endpoint at root level
pub fn health_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .with_state(state)
}
