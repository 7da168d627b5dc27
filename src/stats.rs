//! Process-wide usage counters
//!
//! Counters only grow; the only reset is a process restart.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Aggregate usage statistics
#[derive(Debug)]
pub struct Counters {
    messages_processed: AtomicU64,
    images_analyzed: AtomicU64,
    images_generated: AtomicU64,
    errors: AtomicU64,
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Point-in-time copy of [`Counters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    /// Text messages answered
    pub messages_processed: u64,
    /// Images analyzed
    pub images_analyzed: u64,
    /// Images generated
    pub images_generated: u64,
    /// Collaborator failures
    pub errors: u64,
}

impl CountersSnapshot {
    /// Errors as a percentage of processed messages
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn error_rate(&self) -> f64 {
        self.errors as f64 / self.messages_processed.max(1) as f64 * 100.0
    }

    /// Processed messages per active user
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_messages_per_user(&self, active_users: usize) -> f64 {
        self.messages_processed as f64 / active_users.max(1) as f64
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    /// Create zeroed counters starting the uptime clock now
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages_processed: AtomicU64::new(0),
            images_analyzed: AtomicU64::new(0),
            images_generated: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Count an answered text message
    pub fn record_message(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an analyzed image
    pub fn record_image_analyzed(&self) {
        self.images_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a generated image
    pub fn record_image_generated(&self) {
        self.images_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a collaborator failure
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    #[must_use]
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            images_analyzed: self.images_analyzed.load(Ordering::Relaxed),
            images_generated: self.images_generated.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Wall-clock start time
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time since start
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}
