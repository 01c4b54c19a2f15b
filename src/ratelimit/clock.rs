//! Time sources for the limiter.

#[cfg(any(test, feature = "test-helpers"))]
use parking_lot::Mutex;
#[cfg(any(test, feature = "test-helpers"))]
use std::sync::Arc;
#[cfg(any(test, feature = "test-helpers"))]
use std::time::Duration;
use std::time::Instant;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Available in test builds and with the `test-helpers` feature.
///
/// Clones share the same time, so a test can hand one clone to a
/// [`LimiterStore`](super::LimiterStore) and advance it through another.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Instant>>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Instant) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.current.lock() += by;
    }

    /// Jump to a specific instant.
    pub fn set(&self, instant: Instant) {
        *self.current.lock() = instant;
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }
}
