//! REST API module using Axum
//!
//! HTTP front of the persona chat service. Handlers delegate to
//! `ChatService`; this layer only maps results to status codes.

pub mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Environment variable with comma-separated allowed origins.
pub const CORS_ORIGINS_ENV: &str = "PERSONA_CORS_ORIGINS";

/// Build the CORS layer.
///
/// With `PERSONA_CORS_ORIGINS` set only those origins are allowed;
/// otherwise any origin may call the API.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match std::env::var(CORS_ORIGINS_ENV) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(AllowOrigin::list(allowed))
        }
        Err(_) => base.allow_origin(AllowOrigin::any()),
    }
}

/// Create the complete application router.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .nest("/cv", routes::chat_routes(state.clone()))
        .merge(routes::health_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
