use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

pub use state::AppState;

pub fn build_router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route("/api/chat", post(handlers::chat::chat_handler))
        .with_state(state)
        // CORS
        .layer(CorsLayer::permissive())
        // Tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(DefaultBodyLimit::max(body_limit_bytes))
}
