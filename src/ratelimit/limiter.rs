//! Core rate limiter implementation.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::counter::WindowCounter;
use crate::error::{Result, TurnstileError};

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed
    Admit,
    /// The client has no quota left in its current window
    Reject,
}

impl Decision {
    /// Whether this decision lets the request through.
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit)
    }
}

/// Quota settings, fixed for the lifetime of a [`LimiterStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    max_requests: u64,
    window: Duration,
}

impl LimiterConfig {
    /// Create a validated limiter configuration.
    ///
    /// # Errors
    /// Returns [`TurnstileError::Config`] if `max_requests` or `window` is zero.
    pub fn new(max_requests: u64, window: Duration) -> Result<Self> {
        if max_requests == 0 {
            return Err(TurnstileError::Config(
                "max_requests must be greater than 0".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(TurnstileError::Config(
                "window must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            max_requests,
            window,
        })
    }

    /// Requests allowed per window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Length of the rolling window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// The store of per-client window counters and the admission rule.
///
/// Counters live in a sharded map; every read or write of a counter goes
/// through its shard lock, and [`check`](Self::check) holds that lock for
/// the whole rule evaluation. Calls for one key are therefore linearizable,
/// while keys on different shards proceed in parallel.
///
/// The window is refreshed on every admitted request, not pinned to the
/// first one. A busy client keeps pushing its reset point forward and only
/// gets a fresh quota after a full window of silence.
pub struct LimiterStore {
    /// Counters indexed by client key
    counters: DashMap<String, WindowCounter>,
    capacity: u64,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl LimiterStore {
    /// Create a store that reads time from the system clock.
    pub fn new(config: LimiterConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store with a custom time source.
    pub fn with_clock(config: LimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            capacity: config.max_requests,
            window: config.window,
            clock,
        }
    }

    /// Decide whether a request from `key` may proceed, recording it if so.
    ///
    /// Logging happens after the shard lock is released.
    pub fn check(&self, key: &str) -> Decision {
        let (decision, created) = match self.counters.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(WindowCounter::new(self.capacity, self.clock.now()));
                (Decision::Admit, true)
            }
            Entry::Occupied(mut slot) => {
                let now = self.clock.now();
                let counter = slot.get_mut();

                if counter.is_expired(self.window, now) {
                    *counter = WindowCounter::new(self.capacity, now);
                    (Decision::Admit, false)
                } else if counter.remaining > 0 {
                    counter.remaining -= 1;
                    counter.window_start = now;
                    (Decision::Admit, false)
                } else {
                    (Decision::Reject, false)
                }
            }
        };

        if created {
            debug!(key = %key, capacity = self.capacity, "Created window counter");
        }
        if decision == Decision::Reject {
            debug!(key = %key, "Rate limit exceeded");
        } else {
            trace!(key = %key, "Request admitted");
        }

        decision
    }

    /// Remove every counter idle for longer than `staleness_horizon`.
    ///
    /// Returns the number of counters removed.
    pub fn sweep(&self, staleness_horizon: Duration) -> usize {
        let now = self.clock.now();
        let mut evicted = Vec::new();

        self.counters.retain(|key, counter| {
            let keep = counter.idle_for(now) <= staleness_horizon;
            if !keep {
                evicted.push(key.clone());
            }
            keep
        });

        for key in &evicted {
            trace!(key = %key, "Evicted idle window counter");
        }

        evicted.len()
    }

    /// Quota left for `key`, or `None` if the key has no counter.
    pub fn remaining(&self, key: &str) -> Option<u64> {
        self.counters.get(key).map(|c| c.remaining)
    }

    /// Requests allowed per window.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Length of the rolling window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Get the number of tracked client keys.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no client key is tracked.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Clear all counters.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Instant;

    fn store_with_clock(capacity: u64, window_secs: u64) -> (LimiterStore, ManualClock) {
        let clock = ManualClock::new(Instant::now());
        let config = LimiterConfig::new(capacity, Duration::from_secs(window_secs)).unwrap();
        let store = LimiterStore::with_clock(config, Arc::new(clock.clone()));
        (store, clock)
    }

    #[test]
    fn test_config_rejects_zero_capacity() {
        assert!(LimiterConfig::new(0, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_config_rejects_zero_window() {
        assert!(LimiterConfig::new(5, Duration::ZERO).is_err());
    }

    #[test]
    fn test_store_creation() {
        let (store, _) = store_with_clock(10, 10);
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 10);
        assert_eq!(store.window(), Duration::from_secs(10));
    }

    #[test]
    fn test_first_check_creates_counter() {
        let (store, _) = store_with_clock(10, 10);

        assert_eq!(store.check("A"), Decision::Admit);
        assert_eq!(store.len(), 1);
        assert_eq!(store.remaining("A"), Some(9));
    }

    #[test]
    fn test_quota_exhausted_then_reset_after_window() {
        let (store, clock) = store_with_clock(10, 10);

        for _ in 0..10 {
            assert_eq!(store.check("A"), Decision::Admit);
            clock.advance(Duration::from_millis(100));
        }
        assert_eq!(store.remaining("A"), Some(0));

        assert_eq!(store.check("A"), Decision::Reject);
        assert_eq!(store.remaining("A"), Some(0));

        clock.advance(Duration::from_secs(11));
        assert_eq!(store.check("A"), Decision::Admit);
        assert_eq!(store.remaining("A"), Some(9));
    }

    #[test]
    fn test_reject_does_not_refresh_window() {
        let (store, clock) = store_with_clock(1, 10);

        assert_eq!(store.check("A"), Decision::Admit);
        clock.advance(Duration::from_secs(6));
        assert_eq!(store.check("A"), Decision::Reject);

        // 11s after the admitted call, 5s after the rejected one
        clock.advance(Duration::from_secs(5));
        assert_eq!(store.check("A"), Decision::Admit);
    }

    #[test]
    fn test_admission_extends_window() {
        let (store, clock) = store_with_clock(3, 10);

        assert_eq!(store.check("A"), Decision::Admit);
        clock.advance(Duration::from_secs(8));
        assert_eq!(store.check("A"), Decision::Admit);
        clock.advance(Duration::from_secs(8));

        // 16s since the window opened, but only 8s since the last admit
        assert_eq!(store.check("A"), Decision::Admit);
        assert_eq!(store.remaining("A"), Some(0));
        assert_eq!(store.check("A"), Decision::Reject);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let (store, clock) = store_with_clock(1, 10);

        store.check("A");
        clock.advance(Duration::from_secs(10));
        assert_eq!(store.check("A"), Decision::Reject);
    }

    #[test]
    fn test_keys_are_independent() {
        let (store, _) = store_with_clock(2, 10);

        assert_eq!(store.check("A"), Decision::Admit);
        assert_eq!(store.check("A"), Decision::Admit);
        assert_eq!(store.check("A"), Decision::Reject);

        assert_eq!(store.check("B"), Decision::Admit);
        assert_eq!(store.remaining("B"), Some(1));
        assert_eq!(store.remaining("A"), Some(0));
    }

    #[test]
    fn test_sweep_removes_only_idle_counters() {
        let (store, clock) = store_with_clock(10, 10);
        let horizon = Duration::from_secs(3600);

        store.check("old");
        clock.advance(Duration::from_secs(3000));
        store.check("recent");
        clock.advance(Duration::from_secs(601));

        assert_eq!(store.sweep(horizon), 1);
        assert_eq!(store.remaining("old"), None);
        assert_eq!(store.remaining("recent"), Some(9));
    }

    #[test]
    fn test_sweep_keeps_counter_idle_exactly_horizon() {
        let (store, clock) = store_with_clock(10, 10);
        let horizon = Duration::from_secs(3600);

        store.check("A");
        clock.advance(horizon);
        assert_eq!(store.sweep(horizon), 0);
        assert_eq!(store.remaining("A"), Some(9));

        clock.advance(Duration::from_millis(1));
        assert_eq!(store.sweep(horizon), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_counters() {
        let (store, _) = store_with_clock(10, 10);

        store.check("A");
        store.check("B");
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
    }

    fn hammer(store: Arc<LimiterStore>, key: &'static str, calls: usize) -> usize {
        let barrier = Arc::new(Barrier::new(calls));
        let handles: Vec<_> = (0..calls)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.check(key)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Decision::is_admit)
            .count()
    }

    #[test]
    fn test_concurrent_checks_admit_exactly_capacity() {
        let config = LimiterConfig::new(10, Duration::from_secs(60)).unwrap();
        let store = Arc::new(LimiterStore::new(config));

        let admitted = hammer(Arc::clone(&store), "A", 25);

        assert_eq!(admitted, 10);
        assert_eq!(store.remaining("A"), Some(0));
    }

    #[test]
    fn test_sweeping_live_counters_does_not_disturb_quota() {
        let config = LimiterConfig::new(10, Duration::from_secs(60)).unwrap();
        let store = Arc::new(LimiterStore::new(config));
        let done = Arc::new(AtomicBool::new(false));

        let sweeper = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    assert_eq!(store.sweep(Duration::from_secs(3600)), 0);
                }
            })
        };

        let admitted = hammer(Arc::clone(&store), "A", 25);
        done.store(true, Ordering::SeqCst);
        sweeper.join().unwrap();

        assert_eq!(admitted, 10);
        assert_eq!(store.remaining("A"), Some(0));
    }

    #[test]
    fn test_eviction_racing_checks_recreates_counter() {
        let (store, clock) = store_with_clock(5, 10);
        let store = Arc::new(store);
        let done = Arc::new(AtomicBool::new(false));

        // Every counter is older than a zero horizon once the clock moves
        let sweeper = {
            let store = Arc::clone(&store);
            let clock = clock.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    clock.advance(Duration::from_millis(1));
                    store.sweep(Duration::ZERO);
                }
            })
        };

        let checkers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..200 {
                        store.check("A");
                        if let Some(remaining) = store.remaining("A") {
                            assert!(remaining < 5);
                        }
                    }
                })
            })
            .collect();

        for checker in checkers {
            checker.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
        sweeper.join().unwrap();

        // A counter dropped mid-race is simply recreated
        clock.advance(Duration::from_millis(1));
        store.sweep(Duration::ZERO);
        assert!(store.check("A").is_admit());
        assert_eq!(store.remaining("A"), Some(4));
    }

    #[test]
    fn test_concurrent_pair_with_capacity_one() {
        let config = LimiterConfig::new(1, Duration::from_secs(10)).unwrap();
        let store = Arc::new(LimiterStore::new(config));

        assert_eq!(hammer(store, "B", 2), 1);
    }
}
