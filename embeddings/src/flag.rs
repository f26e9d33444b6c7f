//! Per-instance vectorization switch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared "is vectorization enabled" flag.
///
/// Clones observe the same value. Components read it at the start of every
/// embedding and search call, so toggling takes effect on the next call.
#[derive(Debug, Clone)]
pub struct FeatureFlag {
    enabled: Arc<AtomicBool>,
}

impl FeatureFlag {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl Default for FeatureFlag {
    fn default() -> Self {
        Self::new(true)
    }
}
