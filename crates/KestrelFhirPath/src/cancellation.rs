//! Cooperative cancellation.
//!
//! The evaluator checks the token every [`CHECK_INTERVAL`] iterations of its
//! per-element loops and at the start of aggregate functions; regex workers
//! poll it while waiting. A cancelled evaluation fails with `Timeout`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Iterations between cancellation checks in per-element loops.
pub const CHECK_INTERVAL: usize = 100;

/// A shareable cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
