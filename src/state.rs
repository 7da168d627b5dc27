//! Shared process state handed to every handler

use crate::config::Settings;
use crate::conversation::ConversationStore;
use crate::limiter::RateLimiter;
use crate::stats::Counters;
use std::sync::Arc;

/// Everything the bot and the status server share.
///
/// Built once at startup and passed around behind an `Arc`.
pub struct AppState {
    /// Loaded settings
    pub settings: Arc<Settings>,
    /// Per-user request limiter
    pub limiter: RateLimiter,
    /// Per-user conversation history
    pub conversations: ConversationStore,
    /// Aggregate usage counters
    pub counters: Counters,
}

impl AppState {
    /// Build state whose limiter follows the settings
    #[must_use]
    pub fn new(settings: Arc<Settings>) -> Self {
        let limiter = RateLimiter::new(settings.rate_limit_window(), settings.rate_limit_messages);
        Self {
            settings,
            limiter,
            conversations: ConversationStore::new(),
            counters: Counters::new(),
        }
    }
}
