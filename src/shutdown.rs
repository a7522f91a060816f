//! # Cooperative shutdown
//! A flag the control loop checks on every iteration. Once set it stays set.
use portable_atomic::{AtomicBool, Ordering};

/// One-shot stop request shared between tasks
#[derive(Debug, Default)]
pub struct CancellationToken {
    /// Set once a stop has been requested
    cancelled: AtomicBool,
}

impl CancellationToken {
    /// A token that has not been cancelled
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Ask every holder of the token to stop
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
