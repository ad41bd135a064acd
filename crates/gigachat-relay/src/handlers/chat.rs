use crate::models::chat::{ChatRequest, ChatResponse};
use crate::services::ConversationManager;
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::info;

/// POST /api/chat
///
/// Always answers 200 once the body parses; upstream failures are reported
/// inside `response` text.
pub async fn chat_handler(
    State(conversation_manager): State<Arc<ConversationManager>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    info!(
        "Chat request: user={}, message_len={}",
        request.user_id,
        request.message.chars().count()
    );

    let response = conversation_manager
        .handle_message(request.user_id, request.message)
        .await;

    Json(ChatResponse { response })
}
