use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::models::chat::UserId;
use super::types::ConversationHistory;

/// Keyed storage of per-user conversation histories
pub trait SessionStore: Send + Sync {
    /// Current history of the user, None if the user has not chatted yet
    fn get(&self, user_id: UserId) -> Option<ConversationHistory>;

    /// Replace the stored history of the user
    fn put(&self, user_id: UserId, history: ConversationHistory);

    /// Number of users with a stored history
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop histories not written for longer than `max_idle`.
    /// Returns number of sessions removed
    fn remove_idle(&self, max_idle: Duration) -> usize;
}

#[derive(Debug, Clone)]
struct SessionEntry {
    history: ConversationHistory,
    last_activity: Instant,
}

/// Process-memory session store backed by DashMap
#[derive(Default)]
pub struct InMemorySessionStore {
    storage: DashMap<UserId, SessionEntry>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        info!("Initializing in-memory session store with DashMap");
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, user_id: UserId) -> Option<ConversationHistory> {
        let entry = self.storage.get(&user_id)?;
        Some(entry.history.clone())
    }

    fn put(&self, user_id: UserId, history: ConversationHistory) {
        debug!("Storing {} messages for user {}", history.len(), user_id);
        self.storage.insert(
            user_id,
            SessionEntry {
                history,
                last_activity: Instant::now(),
            },
        );
    }

    fn len(&self) -> usize {
        self.storage.len()
    }

    fn remove_idle(&self, max_idle: Duration) -> usize {
        let start_len = self.storage.len();
        self.storage.retain(|_, entry| entry.last_activity.elapsed() <= max_idle);
        let count = start_len.saturating_sub(self.storage.len());

        if count > 0 {
            info!("Cleaned up {} idle sessions", count);
        }

        count
    }
}
