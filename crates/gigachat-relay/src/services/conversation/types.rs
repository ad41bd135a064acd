use crate::models::chat::ChatMessage;

/// Default number of most-recent messages kept per user
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Ordered message history of one user.
///
/// Order is chronological. The only non-append mutations are dropping from
/// the front (window truncation) and inserting the system prompt at index 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Keep only the last `window` messages, oldest dropped first.
    /// Returns how many messages were dropped.
    pub fn truncate_to_window(&mut self, window: usize) -> usize {
        let excess = self.messages.len().saturating_sub(window);
        if excess > 0 {
            self.messages.drain(..excess);
        }
        excess
    }

    pub fn has_system_prompt(&self) -> bool {
        self.messages.iter().any(ChatMessage::is_system)
    }

    /// Insert the system prompt at index 0 unless some system message is
    /// already present. Returns true when it was inserted.
    pub fn ensure_system_prompt(&mut self, prompt: &str) -> bool {
        if self.has_system_prompt() {
            return false;
        }
        self.messages.insert(0, ChatMessage::system(prompt));
        true
    }
}
