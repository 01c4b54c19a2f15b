//! Rate limiting logic and state management.

mod clock;
mod counter;
mod gate;
mod limiter;
mod reclaimer;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-helpers"))]
pub use clock::ManualClock;
pub use counter::WindowCounter;
pub use gate::AdmissionGate;
pub use limiter::{Decision, LimiterConfig, LimiterStore};
pub use reclaimer::{Reclaimer, ReclaimerConfig, ReclaimerHandle, MAX_RECLAIM_DURATION};
