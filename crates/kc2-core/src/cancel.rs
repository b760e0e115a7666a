//! Cooperative cancellation.
//!
//! Unbounded solver loops poll a [`CancelToken`] once per iteration and stop
//! cleanly between whole row operations. The token is a shared atomic flag,
//! so a controller thread can stop a running walk without any other shared
//! state, the same termination scheme used for racing solver configurations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag used to stop a running solver from outside.
///
/// Cloning the token yields a handle to the same flag. Cancellation is
/// one-way and sticky.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// True once [`cancel`](Self::cancel) has been called on any handle.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
