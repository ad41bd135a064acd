use serde::{Deserialize, Serialize};

/// Stable identifier of the chatting user (JSON integer on the wire)
pub type UserId = i64;

// ===== MESSAGE MODELS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Single chat message, as submitted to the completion API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: UserId,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}
