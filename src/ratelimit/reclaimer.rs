//! Background eviction of idle window counters.
//!
//! The reclaimer wakes on a fixed period and drops every counter whose last
//! admitted request is older than the staleness horizon. This keeps memory
//! proportional to the clients seen recently rather than all clients ever
//! seen. The store's shard locks are taken only for the sweep itself, never
//! across the wait between ticks.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::limiter::LimiterStore;
use crate::error::{Result, TurnstileError};

/// Default time between sweeps.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
/// Default idle time after which a counter is evicted.
const DEFAULT_STALENESS_HORIZON: Duration = Duration::from_secs(3600);
/// Longest accepted interval or horizon; larger values overflow timer deadlines.
pub const MAX_RECLAIM_DURATION: Duration = Duration::from_secs(365 * 24 * 3600);

/// Configuration for the reclaimer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimerConfig {
    /// How often to sweep
    pub interval: Duration,
    /// Idle time after which a counter is removed
    pub staleness_horizon: Duration,
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            staleness_horizon: DEFAULT_STALENESS_HORIZON,
        }
    }
}

impl ReclaimerConfig {
    /// Create a validated reclaimer configuration.
    ///
    /// # Errors
    /// Returns [`TurnstileError::Config`] if either duration is zero or
    /// longer than [`MAX_RECLAIM_DURATION`].
    pub fn new(interval: Duration, staleness_horizon: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(TurnstileError::Config(
                "reclaim interval must be greater than 0".to_string(),
            ));
        }
        if staleness_horizon.is_zero() {
            return Err(TurnstileError::Config(
                "staleness horizon must be greater than 0".to_string(),
            ));
        }
        if interval > MAX_RECLAIM_DURATION || staleness_horizon > MAX_RECLAIM_DURATION {
            return Err(TurnstileError::Config(format!(
                "reclaim interval and staleness horizon must not exceed {}s",
                MAX_RECLAIM_DURATION.as_secs()
            )));
        }
        Ok(Self {
            interval,
            staleness_horizon,
        })
    }
}

/// Periodic sweeper over a shared [`LimiterStore`].
pub struct Reclaimer {
    store: Arc<LimiterStore>,
    config: ReclaimerConfig,
}

impl Reclaimer {
    /// Create a reclaimer for `store`.
    pub fn new(store: Arc<LimiterStore>, config: ReclaimerConfig) -> Self {
        Self { store, config }
    }

    /// Run one sweep now. Returns the number of counters evicted.
    pub fn tick(&self) -> usize {
        let removed = self.store.sweep(self.config.staleness_horizon);
        if removed > 0 {
            info!(
                removed = removed,
                remaining = self.store.len(),
                "Evicted idle window counters"
            );
        } else {
            debug!(tracked = self.store.len(), "Reclaimer sweep found nothing to evict");
        }
        removed
    }

    /// Start sweeping on a background task.
    ///
    /// The first sweep happens one interval after spawning. The task runs
    /// until [`ReclaimerHandle::shutdown`] is called; dropping the handle
    /// leaves it running for the rest of the process.
    pub fn spawn(self) -> ReclaimerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        info!(
            interval = ?self.config.interval,
            staleness_horizon = ?self.config.staleness_horizon,
            "Starting reclaimer"
        );

        let task = tokio::spawn(async move {
            let period = self.config.interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Set once the handle is dropped; the task then runs unsupervised.
            let mut detached = false;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    changed = stop_rx.changed(), if !detached => {
                        match changed {
                            Ok(()) if *stop_rx.borrow() => break,
                            Ok(()) => {}
                            Err(_) => detached = true,
                        }
                    }
                }
            }

            info!("Reclaimer stopped");
        });

        ReclaimerHandle { stop_tx, task }
    }
}

/// Handle to a running reclaimer task.
pub struct ReclaimerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReclaimerHandle {
    /// Stop the reclaimer and wait for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Reclaimer task failed");
        }
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
