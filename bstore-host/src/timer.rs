//! One-shot timer driven by an external loop.

use std::time::{Duration, Instant};

/// A single pending deadline.
///
/// The timer never fires by itself: the owning loop asks for the
/// [`deadline`](Self::deadline), sleeps until then, and calls
/// [`take_if_expired`](Self::take_if_expired). Dropping the timer drops the
/// deadline, so there is never a callback left behind.
#[derive(Debug, Clone, Default)]
pub struct OneShotTimer {
    deadline: Option<Instant>,
}

impl OneShotTimer {
    /// Create a stopped timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to expire `delay` after `now`, replacing any earlier deadline.
    pub fn start(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    /// Disarm the timer.
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// True while a deadline is pending.
    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// The pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and return true if the deadline has passed at `now`.
    pub fn take_if_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
