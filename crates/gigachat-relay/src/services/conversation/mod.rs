//! Conversation memory management module
//!
//! Provides the per-user rolling message window:
//! - Keyed session storage (DashMap)
//! - Window truncation and system prompt injection
//! - Turn handling around the completion provider

pub mod manager;
pub mod store;
pub mod types;

pub use manager::{CompletionProvider, ConversationManager, ERROR_PREFIX};
pub use store::{InMemorySessionStore, SessionStore};
pub use types::{ConversationHistory, DEFAULT_HISTORY_WINDOW};
