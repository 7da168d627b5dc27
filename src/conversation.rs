//! In-memory per-user conversation history
//!
//! Histories are bounded FIFO buffers: appending past the capacity evicts
//! the oldest turns. Nothing is persisted across restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::config::HISTORY_CAPACITY;

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message written by the end user
    User,
    /// Reply produced by the model
    Assistant,
}

/// One stored message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Author of the turn
    pub role: Role,
    /// Text content
    pub content: String,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a user turn stamped with the current time
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Create an assistant turn stamped with the current time
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }
}

type History = Arc<Mutex<VecDeque<ConversationTurn>>>;

/// Bounded conversation histories keyed by user ID
pub struct ConversationStore {
    capacity: usize,
    histories: RwLock<HashMap<i64, History>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Create a store holding up to `HISTORY_CAPACITY` turns per user
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Create a store with a custom per-user capacity (at least 1)
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            histories: RwLock::new(HashMap::new()),
        }
    }

    /// Per-user capacity
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    async fn history_for(&self, user_id: i64) -> History {
        {
            let histories = self.histories.read().await;
            if let Some(history) = histories.get(&user_id) {
                return history.clone();
            }
        }

        let mut histories = self.histories.write().await;
        histories.entry(user_id).or_default().clone()
    }

    /// Append a turn, evicting the oldest ones beyond capacity.
    ///
    /// Returns the history length after the append.
    pub async fn append(&self, user_id: i64, turn: ConversationTurn) -> usize {
        let history = self.history_for(user_id).await;
        let mut history = history.lock().await;

        history.push_back(turn);
        while history.len() > self.capacity {
            history.pop_front();
        }
        history.len()
    }

    /// Ordered snapshot of a user's history (empty if none)
    pub async fn history(&self, user_id: i64) -> Vec<ConversationTurn> {
        let history = {
            let histories = self.histories.read().await;
            histories.get(&user_id).cloned()
        };

        match history {
            Some(history) => history.lock().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Forget everything stored for `user_id`
    pub async fn clear(&self, user_id: i64) {
        let mut histories = self.histories.write().await;
        histories.remove(&user_id);
    }

    async fn lengths(&self) -> Vec<(i64, usize)> {
        let entries: Vec<(i64, History)> = {
            let histories = self.histories.read().await;
            histories
                .iter()
                .map(|(id, history)| (*id, history.clone()))
                .collect()
        };

        let mut lengths = Vec::with_capacity(entries.len());
        for (id, history) in entries {
            let len = history.lock().await.len();
            if len > 0 {
                lengths.push((id, len));
            }
        }
        lengths
    }

    /// Number of users with a non-empty history
    pub async fn active_users(&self) -> usize {
        self.lengths().await.len()
    }

    /// Total number of stored turns across all users
    pub async fn total_turns(&self) -> usize {
        self.lengths().await.iter().map(|(_, len)| len).sum()
    }

    /// Up to `limit` users ordered by history length, longest first
    pub async fn top_users(&self, limit: usize) -> Vec<(i64, usize)> {
        let mut lengths = self.lengths().await;
        lengths.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        lengths.truncate(limit);
        lengths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_keeps_last_twenty_in_order() {
        let store = ConversationStore::new();
        for i in 0..25 {
            store
                .append(1, ConversationTurn::user(&format!("msg {i}")))
                .await;
        }

        let history = store.history(1).await;
        assert_eq!(history.len(), 20);
        assert_eq!(history[0].content, "msg 5");
        assert_eq!(history[19].content, "msg 24");
    }

    #[tokio::test]
    async fn test_short_history_not_truncated() {
        let store = ConversationStore::new();
        for i in 0..3 {
            let len = store
                .append(1, ConversationTurn::assistant(&i.to_string()))
                .await;
            assert_eq!(len, i + 1);
        }
        assert_eq!(store.history(1).await.len(), 3);
    }

    #[tokio::test]
    async fn test_clear_empties_history() {
        let store = ConversationStore::new();
        store.append(1, ConversationTurn::user("hello")).await;
        store.clear(1).await;
        assert!(store.history(1).await.is_empty());

        // Clearing an unknown user is fine
        store.clear(404).await;
        assert!(store.history(404).await.is_empty());
    }

    #[tokio::test]
    async fn test_aggregates() {
        let store = ConversationStore::new();
        store.append(1, ConversationTurn::user("a")).await;
        store.append(2, ConversationTurn::user("a")).await;
        store.append(2, ConversationTurn::assistant("b")).await;
        store.append(3, ConversationTurn::user("a")).await;
        store.clear(3).await;

        assert_eq!(store.active_users().await, 2);
        assert_eq!(store.total_turns().await, 3);
        assert_eq!(store.top_users(10).await, vec![(2, 2), (1, 1)]);
        assert_eq!(store.top_users(1).await, vec![(2, 2)]);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).expect("serializes");
        assert_eq!(json, "\"assistant\"");
    }
}
