use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::ConversationConfig;
use crate::models::chat::{ChatMessage, UserId};
use crate::utils::error::CompletionError;

use super::store::SessionStore;

/// Prefix of the reply text returned when the completion call fails
pub const ERROR_PREFIX: &str = "Ошибка: ";

/// Chat-completion backend.
///
/// Implementations request exactly one choice and return its content.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

pub struct ConversationManager {
    store: Arc<dyn SessionStore>,
    completion_provider: Box<dyn CompletionProvider>,
    system_prompt: String,
    history_window: usize,
    /// Present when turns of one user are serialized
    turn_locks: Option<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl ConversationManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        completion_provider: Box<dyn CompletionProvider>,
        config: &ConversationConfig,
    ) -> Self {
        info!(
            "Initializing conversation manager: window={}, serialize_user_turns={}",
            config.history_window, config.serialize_user_turns
        );

        Self {
            store,
            completion_provider,
            system_prompt: config.system_prompt.clone(),
            history_window: config.history_window.max(1),
            turn_locks: config.serialize_user_turns.then(DashMap::new),
        }
    }

    /// Run one chat turn for `user_id` and return the text to show the user.
    ///
    /// Never fails: a completion error becomes `ERROR_PREFIX` + its description
    /// and leaves the stored history exactly as it was before the turn.
    pub async fn handle_message(&self, user_id: UserId, text: String) -> String {
        let start_time = Instant::now();
        let _turn = self.lock_user(user_id).await;

        let mut history = self.store.get(user_id).unwrap_or_default();
        history.push(ChatMessage::user(text));

        let dropped = history.truncate_to_window(self.history_window);
        if dropped > 0 {
            debug!("Sliding window dropped {} messages for user {}", dropped, user_id);
        }

        // Checked after truncation: an evicted prompt comes back on this turn.
        if history.ensure_system_prompt(&self.system_prompt) {
            debug!("System prompt inserted for user {}", user_id);
        }

        debug!("Submitting {} messages for user {}", history.len(), user_id);

        match self.completion_provider.complete(history.messages()).await {
            Ok(reply) => {
                history.push(ChatMessage::assistant(reply.clone()));
                history.truncate_to_window(self.history_window);
                self.store.put(user_id, history);

                info!(
                    "Chat turn completed for user {} in {}ms",
                    user_id,
                    start_time.elapsed().as_millis()
                );
                reply
            }
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    "Completion failed for user {}: {}", user_id, e
                );
                format!("{}{}", ERROR_PREFIX, e)
            }
        }
    }

    async fn lock_user(&self, user_id: UserId) -> Option<OwnedMutexGuard<()>> {
        let locks = self.turn_locks.as_ref()?;
        let lock = locks.entry(user_id).or_default().clone();
        Some(lock.lock_owned().await)
    }

    /// Number of users with a stored history
    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }

    /// Drop histories idle for longer than `max_idle` together with their
    /// unused turn locks. Returns number of sessions removed
    pub fn sweep_idle_sessions(&self, max_idle: Duration) -> usize {
        let removed = self.store.remove_idle(max_idle);
        if let Some(locks) = &self.turn_locks {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        removed
    }
}
