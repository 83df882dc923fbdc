//! Wall-clock deadline and cooperative cancellation for matching.
//!
//! Matchers poll the deadline between units of work and return whatever
//! they have found so far once it passes. Exceeding a deadline is a
//! bounded-best-effort outcome, not an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + timeout),
            cancel: None,
        }
    }

    /// Expire `timeout` from now if given, otherwise never.
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(t) => Self::after(t),
            None => Self::none(),
        }
    }

    /// Attach a cancellation flag; setting it to true expires the deadline.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// True once the wall clock passed the deadline or the cancel flag is
    /// set. Cheap enough to poll per work unit.
    pub fn exceeded(&self) -> bool {
        if let Some(cancel) = &self.cancel {
            if cancel.load(Ordering::Relaxed) {
                return true;
            }
        }
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}
