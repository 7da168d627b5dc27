//! Sliding-window rate limiting keyed by user.
//!
//! Each user owns a request log behind its own mutex, so the
//! purge-compare-append sequence is atomic per user while requests from
//! different users never wait on each other.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

type RequestLog = Arc<Mutex<VecDeque<Instant>>>;

/// Expired logs are swept once every this many `allow` calls
const SWEEP_INTERVAL: u64 = 1024;

/// Sliding-window request counter
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    logs: RwLock<HashMap<i64, RequestLog>>,
    calls: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window`
    #[must_use]
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            logs: RwLock::new(HashMap::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Length of the sliding window
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Requests allowed per window
    #[must_use]
    pub const fn max_requests(&self) -> usize {
        self.max_requests
    }

    async fn log_for(&self, user_id: i64) -> RequestLog {
        {
            let logs = self.logs.read().await;
            if let Some(log) = logs.get(&user_id) {
                return log.clone();
            }
        }

        let mut logs = self.logs.write().await;
        logs.entry(user_id).or_default().clone()
    }

    fn purge(log: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        // Entries at or before `now - window` fall outside the window
        while let Some(oldest) = log.front() {
            if now.saturating_duration_since(*oldest) >= window {
                log.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records a request at `now` and returns whether it is allowed.
    ///
    /// Rejected requests are not recorded.
    pub async fn allow(&self, user_id: i64, now: Instant) -> bool {
        if self.calls.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep(now).await;
        }

        let log = self.log_for(user_id).await;
        let mut log = log.lock().await;

        Self::purge(&mut log, self.window, now);

        if log.len() >= self.max_requests {
            debug!(
                "Rate limit hit for user {user_id}: {} requests in {:?}",
                log.len(),
                self.window
            );
            return false;
        }

        log.push_back(now);
        true
    }

    /// Drops users whose log holds nothing inside the window at `now`.
    ///
    /// Logs that are locked or referenced by an in-flight call are kept.
    /// Returns the number of users removed.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut logs = self.logs.write().await;
        let before = logs.len();

        logs.retain(|_, log| {
            // No new clones can appear while the write lock is held
            if Arc::strong_count(log) > 1 {
                return true;
            }
            match log.try_lock() {
                Ok(mut entries) => {
                    Self::purge(&mut entries, self.window, now);
                    !entries.is_empty()
                }
                Err(_) => true,
            }
        });

        let removed = before - logs.len();
        if removed > 0 {
            debug!("Swept {removed} idle rate-limit logs");
        }
        removed
    }

    /// Number of users with a stored request log
    pub async fn tracked_users(&self) -> usize {
        self.logs.read().await.len()
    }

    /// Number of requests from `user_id` still inside the window at `now`.
    pub async fn recent_requests(&self, user_id: i64, now: Instant) -> usize {
        let log = {
            let logs = self.logs.read().await;
            logs.get(&user_id).cloned()
        };

        let Some(log) = log else {
            return 0;
        };

        let mut log = log.lock().await;
        Self::purge(&mut log, self.window, now);
        log.len()
    }
}
