//! Admission gate consulted by the transport layer.

use std::sync::Arc;

use super::limiter::{Decision, LimiterStore};
use crate::error::QuotaExceeded;

/// Thin front for a shared [`LimiterStore`].
///
/// Cloning a gate clones the `Arc`, never the store.
#[derive(Clone)]
pub struct AdmissionGate {
    store: Arc<LimiterStore>,
}

impl AdmissionGate {
    /// Create a gate over `store`.
    pub fn new(store: Arc<LimiterStore>) -> Self {
        Self { store }
    }

    /// Let the request from `key` proceed, or report that its quota is spent.
    pub fn check(&self, key: &str) -> Result<(), QuotaExceeded> {
        match self.store.check(key) {
            Decision::Admit => Ok(()),
            Decision::Reject => Err(QuotaExceeded),
        }
    }
}
