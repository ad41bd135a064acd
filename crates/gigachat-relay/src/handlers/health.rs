use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::services::ConversationManager;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    active_sessions: usize,
}

pub async fn health_check(
    State(conversation_manager): State<Arc<ConversationManager>>,
) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_sessions: conversation_manager.active_sessions(),
        }),
    )
}

pub async fn readiness_check() -> StatusCode {
    StatusCode::OK
}
