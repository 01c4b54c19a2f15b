//! Per-client window counter.

use std::time::{Duration, Instant};

/// Quota state for one client key.
///
/// `window_start` doubles as the last-activity stamp: it moves forward on
/// every admitted request, and the reclaimer measures idleness from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    /// Requests still allowed in the current window
    pub remaining: u64,
    /// When the latest admitted request was recorded
    pub window_start: Instant,
}

impl WindowCounter {
    /// Open a fresh window at `now`.
    ///
    /// Opening the window is itself the first admitted request, so the
    /// counter starts at `capacity - 1`.
    pub fn new(capacity: u64, now: Instant) -> Self {
        Self {
            remaining: capacity.saturating_sub(1),
            window_start: now,
        }
    }

    /// Time since the latest admitted request.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.window_start)
    }

    /// Whether the window has fully elapsed at `now`.
    pub fn is_expired(&self, window: Duration, now: Instant) -> bool {
        self.idle_for(now) > window
    }
}
